pub mod jobs;
pub mod listmodels;
pub mod submit;
