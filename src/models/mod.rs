pub mod correlation;
pub mod diary;
pub mod questionnaire;
pub mod user;
