use async_trait::async_trait;
use docqa_core::{
    ChatModel, HashedEmbedder, IndexMode, LoadError, LocalVectorIndex, PipelineConfig,
    PipelineError, Reply, ServiceError, Session, UploadedFile, VectorIndex, FALLBACK_ANSWER,
    NOT_PROCESSED_WARNING,
};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// Answers only when the context section of the prompt contains `needle`.
struct ContextOracle {
    needle: &'static str,
    answer: &'static str,
    calls: AtomicUsize,
}

impl ContextOracle {
    fn new(needle: &'static str, answer: &'static str) -> Arc<Self> {
        Arc::new(Self {
            needle,
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ContextOracle {
    fn model(&self) -> &str {
        "context-oracle"
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(temperature, 0.0);

        let context = prompt
            .split_once("Context:\n")
            .and_then(|(_, rest)| rest.split_once("\n\nQuestion:\n"))
            .map(|(context, _)| context)
            .unwrap_or_default();

        if context.contains(self.needle) {
            Ok(self.answer.to_string())
        } else {
            Ok(FALLBACK_ANSWER.to_string())
        }
    }
}

struct UnreachableModel;

#[async_trait]
impl ChatModel for UnreachableModel {
    fn model(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, ServiceError> {
        Err(ServiceError::BackendResponse {
            service: "chat-completions".to_string(),
            status: 503,
            details: "service unavailable".to_string(),
        })
    }
}

fn session(dir: &TempDir, model: Arc<dyn ChatModel>) -> Session {
    let config = PipelineConfig {
        upload_dir: dir.path().join("data"),
        index_dir: dir.path().join("vector_db"),
        ..PipelineConfig::default()
    };
    let index = LocalVectorIndex::new(config.index_dir.clone());
    Session::new(config, Arc::new(HashedEmbedder::default()), Box::new(index))
        .expect("default pipeline config is valid")
        .with_chat_model(model)
}

fn answer_text(reply: &Reply) -> &str {
    match reply {
        Reply::Answer { text, .. } => text,
        Reply::NotProcessed => panic!("expected an answer, got {reply:?}"),
    }
}

#[tokio::test]
async fn sky_question_is_answered_from_the_uploaded_text() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("blue", "The sky is blue.");
    let mut session = session(&dir, model.clone());

    let report = session
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Rebuild,
        )
        .await?;
    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 1);

    let reply = session.ask("What color is the sky?").await?;

    match &reply {
        Reply::Answer {
            text,
            grounded,
            sources,
        } => {
            assert!(text.contains("blue"));
            assert!(*grounded);
            assert!(sources[0].chunk_text.contains("blue"));
            assert_eq!(sources[0].metadata.source_id, "sky.txt");
        }
        Reply::NotProcessed => panic!("documents were processed"),
    }
    assert_eq!(model.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn asking_before_processing_warns_without_calling_the_model() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("blue", "The sky is blue.");
    let session = session(&dir, model.clone());

    let reply = session.ask("What color is the sky?").await?;

    assert_eq!(reply, Reply::NotProcessed);
    assert_eq!(reply.to_string(), NOT_PROCESSED_WARNING);
    assert_eq!(model.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn unrelated_question_gets_the_fallback_answer() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("Paris", "Paris is the capital of France.");
    let mut session = session(&dir, model.clone());

    session
        .process(
            &[UploadedFile::new(
                "apples.txt",
                "Apples grow on trees. Red apples are sweet and green apples are tart.",
            )],
            IndexMode::Rebuild,
        )
        .await?;

    let reply = session.ask("What is the capital of France?").await?;

    assert_eq!(answer_text(&reply), FALLBACK_ANSWER);
    assert!(matches!(reply, Reply::Answer { grounded: false, .. }));
    assert_eq!(model.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn reprocessing_replaces_the_previous_documents() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("apples", "Apples are red.");
    let mut session = session(&dir, model.clone());

    session
        .process(
            &[UploadedFile::new("apples.txt", "Red apples grow in the orchard.")],
            IndexMode::Rebuild,
        )
        .await?;
    let before = session.ask("What grows in the orchard?").await?;
    assert_eq!(answer_text(&before), "Apples are red.");

    session
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Rebuild,
        )
        .await?;
    let after = session.ask("What grows in the orchard?").await?;

    assert_eq!(answer_text(&after), FALLBACK_ANSWER);
    match after {
        Reply::Answer { sources, .. } => {
            assert!(sources
                .iter()
                .all(|hit| !hit.chunk_text.contains("apples")));
            assert!(sources
                .iter()
                .all(|hit| hit.metadata.source_id == "sky.txt"));
        }
        Reply::NotProcessed => panic!("documents were processed"),
    }
    assert_eq!(session.index().len(), 1);
    Ok(())
}

#[tokio::test]
async fn append_mode_keeps_earlier_documents() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("apples", "Apples are red.");
    let mut session = session(&dir, model);

    session
        .process(
            &[UploadedFile::new("apples.txt", "Red apples grow in the orchard.")],
            IndexMode::Rebuild,
        )
        .await?;
    let report = session
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Append,
        )
        .await?;

    assert_eq!(report.indexed, 2);
    let reply = session.ask("What grows in the orchard?").await?;
    assert_eq!(answer_text(&reply), "Apples are red.");
    Ok(())
}

#[tokio::test]
async fn processing_the_same_documents_twice_gives_stable_results() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("pump", "Check the pump.");
    let mut session = session(&dir, model);
    let text = (0..20)
        .map(|index| {
            format!("Step {index}: inspect the hydraulic pump seal and record the pressure.")
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let files = [
        UploadedFile::new("manual.txt", text.clone()),
        UploadedFile::new("notes.txt", "The pump room is on the second floor."),
    ];

    session.process(&files, IndexMode::Rebuild).await?;
    let first = session.ask("Where is the pump room?").await?;
    session.process(&files, IndexMode::Rebuild).await?;
    let second = session.ask("Where is the pump room?").await?;

    let ids = |reply: &Reply| match reply {
        Reply::Answer { sources, .. } => sources
            .iter()
            .map(|hit| hit.metadata.chunk_id.clone())
            .collect::<Vec<_>>(),
        Reply::NotProcessed => Vec::new(),
    };
    assert_eq!(ids(&first).len(), 3);
    assert_eq!(ids(&first), ids(&second));
    Ok(())
}

#[tokio::test]
async fn upstream_failures_are_not_reported_as_grounding_misses() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut session = session(&dir, Arc::new(UnreachableModel));

    session
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Rebuild,
        )
        .await?;
    let result = session.ask("What color is the sky?").await;

    assert!(matches!(
        result,
        Err(PipelineError::Upstream(ServiceError::BackendResponse {
            status: 503,
            ..
        }))
    ));

    // The session stays usable after a failed round.
    session
        .process(
            &[UploadedFile::new("more.txt", "Grass is green.")],
            IndexMode::Append,
        )
        .await?;
    assert_eq!(session.index().len(), 2);
    Ok(())
}

#[tokio::test]
async fn a_batch_with_no_readable_files_keeps_the_current_index() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("blue", "The sky is blue.");
    let mut session = session(&dir, model);

    session
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Rebuild,
        )
        .await?;
    let result = session
        .process(
            &[UploadedFile::new("broken.pdf", "%PDF-1.4\n%broken")],
            IndexMode::Rebuild,
        )
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Load(LoadError::NothingLoaded { skipped: 1 }))
    ));
    let reply = session.ask("What color is the sky?").await?;
    assert_eq!(answer_text(&reply), "The sky is blue.");
    Ok(())
}

#[tokio::test]
async fn skipped_files_are_reported_alongside_loaded_ones() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("blue", "The sky is blue.");
    let mut session = session(&dir, model);

    let report = session
        .process(
            &[
                UploadedFile::new("broken.pdf", "%PDF-1.4\n%broken"),
                UploadedFile::new("sky.txt", "The sky is blue."),
            ],
            IndexMode::Rebuild,
        )
        .await?;

    assert_eq!(report.documents, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "broken.pdf");
    Ok(())
}

#[tokio::test]
async fn processed_index_is_persisted_for_a_later_session() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let model = ContextOracle::new("blue", "The sky is blue.");
    let mut first = session(&dir, model.clone());
    first
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Rebuild,
        )
        .await?;

    let reloaded = LocalVectorIndex::load(dir.path().join("vector_db"))?;
    assert_eq!(reloaded.len(), 1);

    let config = PipelineConfig {
        upload_dir: dir.path().join("data"),
        index_dir: dir.path().join("vector_db"),
        ..PipelineConfig::default()
    };
    let second = Session::new(config, Arc::new(HashedEmbedder::default()), Box::new(reloaded))?
        .with_chat_model(model);
    let reply = second.ask("What color is the sky?").await?;
    assert_eq!(answer_text(&reply), "The sky is blue.");
    Ok(())
}

#[tokio::test]
async fn rebuilding_succeeds_over_a_damaged_index_file() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let index_dir = dir.path().join("vector_db");
    std::fs::create_dir_all(&index_dir)?;
    std::fs::write(index_dir.join("index.json"), "garbage")?;

    let config = PipelineConfig {
        upload_dir: dir.path().join("data"),
        index_dir: index_dir.clone(),
        ..PipelineConfig::default()
    };
    let index = LocalVectorIndex::open(&index_dir, IndexMode::Rebuild)?;
    let mut session = Session::new(config, Arc::new(HashedEmbedder::default()), Box::new(index))?
        .with_chat_model(ContextOracle::new("blue", "The sky is blue."));

    session
        .process(
            &[UploadedFile::new("sky.txt", "The sky is blue.")],
            IndexMode::Rebuild,
        )
        .await?;

    assert_eq!(LocalVectorIndex::load(&index_dir)?.len(), 1);
    let reply = session.ask("What color is the sky?").await?;
    assert_eq!(answer_text(&reply), "The sky is blue.");
    Ok(())
}

#[tokio::test]
async fn empty_questions_are_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let session = session(&dir, ContextOracle::new("blue", "blue"));

    assert!(matches!(
        session.ask("   ").await,
        Err(PipelineError::EmptyQuestion)
    ));
    Ok(())
}
