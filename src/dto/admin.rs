use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{dao::models::QuestionEntity, dto::validation::validate_session_id};

/// Question definition pushed by the admin.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct QuestionInput {
    /// Identifier unique within the pushed set.
    pub id: String,
    pub text: String,
    /// Ordered answer options; at least two.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Optional image URL, typically produced by the question-image upload.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.id.trim().is_empty() {
            errors.add("id", ValidationError::new("question_id_blank"));
        }
        if self.text.trim().is_empty() {
            errors.add("text", ValidationError::new("question_text_blank"));
        }
        if self.options.len() < 2 {
            let mut err = ValidationError::new("question_options_count");
            err.message = Some("A question needs at least two options".into());
            errors.add("options", err);
        }
        if self.correct_index >= self.options.len() {
            let mut err = ValidationError::new("question_correct_index");
            err.message = Some("correct_index must point into options".into());
            errors.add("correct_index", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<QuestionInput> for QuestionEntity {
    fn from(value: QuestionInput) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_index: value.correct_index,
            image_url: value.image_url,
        }
    }
}

/// Wholesale replacement of a session's question set and bonus question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpsertQuestionsRequest {
    #[validate(custom(function = validate_session_id))]
    pub session_id: String,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
    #[validate(nested)]
    pub bonus_question: QuestionInput,
}

/// Payload selecting the session for an admin action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartGameRequest {
    #[validate(custom(function = validate_session_id))]
    pub session_id: String,
}

/// Payload selecting the session to reset.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResetSessionRequest {
    #[validate(custom(function = validate_session_id))]
    pub session_id: String,
}

/// Uniform acknowledgement for admin actions.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub ok: bool,
}

impl ActionResponse {
    /// Positive acknowledgement.
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Response carrying the stored image URL.
#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUploadResponse {
    /// URL to set as the question's `image_url`.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: usize, correct_index: usize) -> QuestionInput {
        QuestionInput {
            id: "q1".into(),
            text: "pick one".into(),
            options: (0..options).map(|n| format!("option {n}")).collect(),
            correct_index,
            image_url: None,
        }
    }

    #[test]
    fn a_well_formed_question_validates() {
        assert!(question(4, 3).validate().is_ok());
    }

    #[test]
    fn questions_need_at_least_two_options() {
        assert!(question(1, 0).validate().is_err());
    }

    #[test]
    fn the_correct_index_must_point_into_options() {
        assert!(question(3, 3).validate().is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut input = question(2, 0);
        input.text = "   ".into();
        assert!(input.validate().is_err());
    }
}
