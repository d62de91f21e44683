//! Solve pipeline: typed problems go straight to the text model; photographed problems are
//! transcribed by the vision model first and then solved as text.
//!
//! When transcription yields too little text, the pipeline falls back to a single direct
//! image-to-solution call on the vision model. Every failure ends in a user-facing apology,
//! never an error.

pub mod prompts;

use crate::config::{self, Config};
use crate::delivery::normalize;
use crate::llm::{
    ChatMessage, ContentPart, InferenceClient, ModelInvocation, OpenAiClient, SamplingParams,
};
use prompts::{
    EXTRACT_SYSTEM_PROMPT, EXTRACT_USER_TEXT, IMAGE_SOLVE_USER_TEXT, SOLVE_SYSTEM_PROMPT,
    UNREADABLE_MARKER,
};
use std::sync::Arc;
use std::time::Duration;

/// Reply when the text solving stage produced nothing.
pub const SOLVER_UNAVAILABLE: &str = "I couldn't reach the solver right now. Try again in a moment.";
/// Reply when neither transcription nor direct image solving produced anything.
pub const IMAGE_UNREADABLE: &str = "I couldn't read the image. Please send it again.";

/// Default minimum length (characters) of a usable transcription.
pub const DEFAULT_MIN_EXTRACT_CHARS: usize = 12;

const TEXT_SOLVE_SAMPLING: SamplingParams = SamplingParams {
    max_tokens: 900,
    temperature: 0.1,
    top_p: 1.0,
    frequency_penalty: 0.4,
    presence_penalty: 0.0,
};

const IMAGE_SOLVE_SAMPLING: SamplingParams = SamplingParams {
    max_tokens: 1100,
    ..TEXT_SOLVE_SAMPLING
};

const EXTRACT_SAMPLING: SamplingParams = SamplingParams {
    max_tokens: 700,
    temperature: 0.0,
    top_p: 1.0,
    frequency_penalty: 0.0,
    presence_penalty: 0.0,
};

/// One problem to solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveRequest {
    Text(String),
    Image { bytes: Vec<u8>, mime: String },
}

/// Models used by the pipeline.
#[derive(Debug, Clone)]
pub struct SolverModels {
    pub vision: String,
    pub text: String,
}

/// Runs text and image solves over an [`InferenceClient`].
#[derive(Clone)]
pub struct Solver {
    inference: InferenceClient,
    models: SolverModels,
    min_extract_chars: usize,
}

impl Solver {
    pub fn new(inference: InferenceClient, models: SolverModels) -> Self {
        Self {
            inference,
            models,
            min_extract_chars: DEFAULT_MIN_EXTRACT_CHARS,
        }
    }

    /// Solver over the configured OpenAI-compatible endpoint and models.
    pub fn from_config(config: &Config) -> Self {
        let inference = &config.inference;
        let backend = OpenAiClient::new(
            Some(inference.base_url.clone()),
            config::resolve_inference_key(config),
        )
        .with_timeout(Duration::from_secs(inference.timeout_secs));
        Self::new(
            InferenceClient::new(Arc::new(backend), inference.fallback_model.clone()),
            SolverModels {
                vision: inference.vision_model.clone(),
                text: inference.text_model.clone(),
            },
        )
        .with_min_extract_chars(inference.min_extract_chars)
    }

    pub fn with_min_extract_chars(mut self, min: usize) -> Self {
        self.min_extract_chars = min;
        self
    }

    pub async fn solve(&self, request: &SolveRequest) -> String {
        match request {
            SolveRequest::Text(problem) => self.solve_text(problem).await,
            SolveRequest::Image { bytes, mime } => self.solve_image(bytes, mime).await,
        }
    }

    /// Solve a typed problem with the text model and the tutoring rubric.
    pub async fn solve_text(&self, problem: &str) -> String {
        let invocation = ModelInvocation::new(
            self.models.text.as_str(),
            vec![
                ChatMessage::system(SOLVE_SYSTEM_PROMPT),
                ChatMessage::user(problem),
            ],
            TEXT_SOLVE_SAMPLING,
        );
        match self.inference.invoke(&invocation).await {
            Some(answer) => normalize(&answer),
            None => SOLVER_UNAVAILABLE.to_string(),
        }
    }

    /// Transcribe, then solve the transcription; fall back to one direct image solve when
    /// the transcription is missing or shorter than the threshold.
    pub async fn solve_image(&self, bytes: &[u8], mime: &str) -> String {
        if bytes.is_empty() {
            return IMAGE_UNREADABLE.to_string();
        }
        match self.extract(bytes, mime).await {
            Some(problem) => {
                log::debug!("solve: extracted {} chars from image", problem.chars().count());
                self.solve_text(&problem).await
            }
            None => {
                log::info!("solve: extraction unusable, solving directly from image");
                self.solve_image_direct(bytes, mime).await
            }
        }
    }

    /// Transcription of the problem, or None when it is missing, marked unreadable, or too short.
    async fn extract(&self, bytes: &[u8], mime: &str) -> Option<String> {
        let invocation = ModelInvocation::new(
            self.models.vision.as_str(),
            vec![
                ChatMessage::system(EXTRACT_SYSTEM_PROMPT),
                ChatMessage::user_parts(vec![
                    ContentPart::text(EXTRACT_USER_TEXT),
                    ContentPart::image_data(bytes, mime),
                ]),
            ],
            EXTRACT_SAMPLING,
        );
        let text = self.inference.invoke(&invocation).await?;
        let text = text.trim();
        if text.eq_ignore_ascii_case(UNREADABLE_MARKER)
            || text.chars().count() < self.min_extract_chars
        {
            return None;
        }
        Some(text.to_string())
    }

    async fn solve_image_direct(&self, bytes: &[u8], mime: &str) -> String {
        let invocation = ModelInvocation::new(
            self.models.vision.as_str(),
            vec![
                ChatMessage::system(SOLVE_SYSTEM_PROMPT),
                ChatMessage::user_parts(vec![
                    ContentPart::text(IMAGE_SOLVE_USER_TEXT),
                    ContentPart::image_data(bytes, mime),
                ]),
            ],
            IMAGE_SOLVE_SAMPLING,
        );
        match self.inference.invoke(&invocation).await {
            Some(answer) => normalize(&answer),
            None => IMAGE_UNREADABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmBackend, LlmError, MessageContent};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Stage {
        Extract,
        SolveText,
        SolveImage,
    }

    fn stage_of(inv: &ModelInvocation) -> Stage {
        let system_is_extract = matches!(
            &inv.messages[0].content,
            MessageContent::Text(t) if t == EXTRACT_SYSTEM_PROMPT
        );
        if system_is_extract {
            Stage::Extract
        } else if matches!(inv.messages[1].content, MessageContent::Parts(_)) {
            Stage::SolveImage
        } else {
            Stage::SolveText
        }
    }

    /// Answers by stage regardless of model; None means that stage fails.
    #[derive(Default)]
    struct StagedBackend {
        extract: Option<String>,
        solve_text: Option<String>,
        solve_image: Option<String>,
        calls: Mutex<Vec<ModelInvocation>>,
    }

    impl StagedBackend {
        fn stages(&self) -> Vec<Stage> {
            self.calls.lock().unwrap().iter().map(stage_of).collect()
        }

        fn calls_for(&self, stage: Stage) -> Vec<ModelInvocation> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| stage_of(c) == stage)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl LlmBackend for StagedBackend {
        async fn complete(&self, invocation: &ModelInvocation) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(invocation.clone());
            let answer = match stage_of(invocation) {
                Stage::Extract => self.extract.clone(),
                Stage::SolveText => self.solve_text.clone(),
                Stage::SolveImage => self.solve_image.clone(),
            };
            answer.ok_or(LlmError::EmptyContent)
        }
    }

    fn solver(backend: Arc<StagedBackend>) -> Solver {
        Solver::new(
            InferenceClient::new(backend, "fallback-model"),
            SolverModels {
                vision: "vision-model".into(),
                text: "text-model".into(),
            },
        )
        .with_min_extract_chars(12)
    }

    const PNG: &[u8] = b"\x89PNG fake";

    #[tokio::test]
    async fn text_solve_uses_text_model_and_rubric() {
        let backend = Arc::new(StagedBackend {
            solve_text: Some("f(-x) = x^2  =  f(x)\n\n\n\nFinal answer: EVEN".into()),
            ..Default::default()
        });
        let out = solver(backend.clone()).solve_text("Is f(x)=x^2 even?").await;
        assert_eq!(out, "f(-x) = x^2 = f(x)\n\nFinal answer: EVEN");
        let calls = backend.calls_for(Stage::SolveText);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "text-model");
        assert_eq!(calls[0].messages[1], ChatMessage::user("Is f(x)=x^2 even?"));
        assert_eq!(calls[0].sampling.max_tokens, 900);
    }

    #[tokio::test]
    async fn text_solve_failure_is_apology() {
        let backend = Arc::new(StagedBackend::default());
        let out = solver(backend.clone()).solve_text("2+2?").await;
        assert_eq!(out, SOLVER_UNAVAILABLE);
        assert_eq!(backend.stages(), vec![Stage::SolveText, Stage::SolveText]);
    }

    #[tokio::test]
    async fn long_extraction_is_solved_as_text_without_second_vision_call() {
        let extracted = "Find the eigenvalues of A = [[2,1],[1,2]].";
        let backend = Arc::new(StagedBackend {
            extract: Some(format!("  {}\n", extracted)),
            solve_text: Some("Final answer: 1, 3".into()),
            ..Default::default()
        });
        let out = solver(backend.clone()).solve_image(PNG, "image/png").await;
        assert_eq!(out, "Final answer: 1, 3");
        assert_eq!(backend.stages(), vec![Stage::Extract, Stage::SolveText]);
        let text_call = &backend.calls_for(Stage::SolveText)[0];
        assert_eq!(text_call.model, "text-model");
        assert_eq!(text_call.messages[1], ChatMessage::user(extracted));
        let extract_call = &backend.calls_for(Stage::Extract)[0];
        assert_eq!(extract_call.model, "vision-model");
    }

    #[tokio::test]
    async fn short_extraction_goes_straight_to_image_solve() {
        let backend = Arc::new(StagedBackend {
            extract: Some("x^2".into()),
            solve_text: Some("should not be used".into()),
            solve_image: Some("Final answer: EVEN".into()),
            ..Default::default()
        });
        let out = solver(backend.clone()).solve_image(PNG, "image/png").await;
        assert_eq!(out, "Final answer: EVEN");
        assert_eq!(backend.stages(), vec![Stage::Extract, Stage::SolveImage]);
        let direct = &backend.calls_for(Stage::SolveImage)[0];
        assert_eq!(direct.model, "vision-model");
        assert_eq!(direct.sampling.max_tokens, 1100);
    }

    #[tokio::test]
    async fn unreadable_marker_counts_as_extraction_failure() {
        let backend = Arc::new(StagedBackend {
            extract: Some("UNREADABLE".into()),
            solve_image: Some("The photo is blurry; f looks even. Final answer: EVEN".into()),
            ..Default::default()
        });
        let mut solver = solver(backend.clone());
        solver.min_extract_chars = 1;
        solver.solve_image(PNG, "image/jpeg").await;
        assert!(backend.calls_for(Stage::SolveText).is_empty());
        assert_eq!(backend.calls_for(Stage::SolveImage).len(), 1);
    }

    #[tokio::test]
    async fn extraction_and_direct_failure_is_unreadable_apology() {
        let backend = Arc::new(StagedBackend::default());
        let out = solver(backend.clone()).solve_image(PNG, "image/png").await;
        assert_eq!(out, IMAGE_UNREADABLE);
        assert!(backend.calls_for(Stage::SolveText).is_empty());
    }

    #[tokio::test]
    async fn empty_image_makes_no_calls() {
        let backend = Arc::new(StagedBackend::default());
        let out = solver(backend.clone()).solve_image(&[], "image/png").await;
        assert_eq!(out, IMAGE_UNREADABLE);
        assert!(backend.stages().is_empty());
    }

    #[tokio::test]
    async fn solve_dispatches_on_request_kind() {
        let backend = Arc::new(StagedBackend {
            solve_text: Some("Final answer: 4".into()),
            ..Default::default()
        });
        let out = solver(backend)
            .solve(&SolveRequest::Text("2+2".into()))
            .await;
        assert_eq!(out, "Final answer: 4");
    }
}
