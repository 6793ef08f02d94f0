//! Submission intake validation.
//!
//! [`validate`] decides whether a submission form is admitted. Structural
//! problems (missing job key, blank name, bad email, missing input) come back
//! as [`CoreError::MalformedRequest`]; a well-formed form naming an unknown
//! job, omitting a required parameter or violating a parameter rule comes
//! back as one of the not-acceptable variants.

use std::collections::BTreeMap;

use validator::ValidateEmail;

use crate::blob::BlobRef;
use crate::catalog::Job;
use crate::error::CoreError;
use crate::parameters::{self, BoundParameters};

/// Multipart field carrying the input blob.
pub const FIELD_INPUT_DATA: &str = "input_data";
/// Multipart field naming the job.
pub const FIELD_JOB: &str = "job";
pub const FIELD_SUBMISSION_NAME: &str = "submission_name";
pub const FIELD_EMAIL: &str = "email";

/// Maximum length of a submission name.
const MAX_SUBMISSION_NAME_LEN: usize = 256;

/// The uploaded input before it is persisted.
#[derive(Debug, Clone)]
pub struct InputUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Where the input lives: not yet stored, or already a blob.
#[derive(Debug, Clone)]
pub enum InputData {
    Upload(InputUpload),
    Stored(BlobRef),
}

impl InputData {
    fn is_blank(&self) -> bool {
        match self {
            Self::Upload(upload) => upload.bytes.is_empty(),
            Self::Stored(blob) => blob.as_str().is_empty(),
        }
    }
}

/// Raw intake request as received at the boundary.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub job: Option<String>,
    pub submission_name: Option<String>,
    pub email: Option<String>,
    pub input_data: Option<InputData>,
    /// Every other text field, including `<task>_<alias>` bindings.
    pub fields: BTreeMap<String, String>,
}

/// A form that passed validation, with its parameters bound.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub job: Job,
    pub submission_name: String,
    pub email: String,
    pub input_data: InputData,
    pub parameters: BoundParameters,
}

/// Validate `form`, resolving the job through `lookup`.
///
/// Structural checks run before the job is looked up, so a form that is both
/// structurally broken and names an unknown job is reported as malformed.
pub fn validate<'a, F>(form: &SubmissionForm, lookup: F) -> Result<ValidatedSubmission, CoreError>
where
    F: FnOnce(&str) -> Option<&'a Job>,
{
    let job_key = non_blank(form.job.as_deref())
        .ok_or_else(|| CoreError::MalformedRequest("job is required".into()))?;

    let submission_name = non_blank(form.submission_name.as_deref())
        .ok_or_else(|| CoreError::MalformedRequest("submission_name must not be blank".into()))?;
    if submission_name.chars().count() > MAX_SUBMISSION_NAME_LEN {
        return Err(CoreError::MalformedRequest(format!(
            "submission_name must not exceed {MAX_SUBMISSION_NAME_LEN} characters"
        )));
    }

    let email = non_blank(form.email.as_deref())
        .ok_or_else(|| CoreError::MalformedRequest("email is required".into()))?;
    if !email.validate_email() {
        return Err(CoreError::MalformedRequest(format!(
            "'{email}' is not a valid email address"
        )));
    }

    let input_data = form
        .input_data
        .as_ref()
        .filter(|input| !input.is_blank())
        .ok_or_else(|| CoreError::MalformedRequest("input_data is required".into()))?;

    let job = lookup(job_key).ok_or_else(|| CoreError::UnknownJob(job_key.to_string()))?;

    let bound = parameters::resolve(job, &form.fields);
    let missing: Vec<String> = parameters::required_parameters(job)
        .into_iter()
        .filter(|key| !bound.contains_key(key))
        .map(|key| key.field_name())
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::MissingParameters(missing));
    }

    for step in job.ordered_steps() {
        for param in &step.task.parameters {
            let key = parameters::ParameterKey::new(&step.task.name, &param.rest_alias);
            if let Some(value) = bound.get(&key) {
                param
                    .rule
                    .check(value)
                    .map_err(|reason| CoreError::InvalidParameter {
                        key: key.field_name(),
                        reason,
                    })?;
            }
        }
    }

    Ok(ValidatedSubmission {
        job: job.clone(),
        submission_name: submission_name.to_string(),
        email: email.to_string(),
        input_data: input_data.clone(),
        parameters: bound.into(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{job, task};
    use crate::parameters::ParameterRule;

    fn upload() -> InputData {
        InputData::Upload(InputUpload {
            filename: "file1.txt".into(),
            bytes: b"these are the file contents!".to_vec(),
        })
    }

    fn base_form() -> SubmissionForm {
        SubmissionForm {
            job: Some("job1".into()),
            submission_name: Some("test".into()),
            email: Some("a@b.com".into()),
            input_data: Some(upload()),
            fields: BTreeMap::new(),
        }
    }

    fn with_fields(mut form: SubmissionForm, pairs: &[(&str, &str)]) -> SubmissionForm {
        for (k, v) in pairs {
            form.fields.insert(k.to_string(), v.to_string());
        }
        form
    }

    fn run(form: &SubmissionForm, catalog: &[Job]) -> Result<ValidatedSubmission, CoreError> {
        validate(form, |name| catalog.iter().find(|j| j.name == name))
    }

    fn one_task_job(aliases: &[&str]) -> Vec<Job> {
        vec![job("job1", vec![task(1, "task1", aliases)])]
    }

    #[test]
    fn accepts_when_all_params_given() {
        let catalog = one_task_job(&["this", "that"]);
        let form = with_fields(base_form(), &[("task1_this", "Value1"), ("task1_that", "Value2")]);
        let ok = run(&form, &catalog).expect("should accept");
        assert_eq!(ok.parameters.len(), 2);
        assert_eq!(ok.submission_name, "test");
    }

    #[test]
    fn accepts_job_without_parameters() {
        let catalog = one_task_job(&[]);
        assert!(run(&base_form(), &catalog).is_ok());
    }

    #[test]
    fn rejects_when_a_param_is_missed() {
        let catalog = one_task_job(&["this", "that"]);
        let form = with_fields(base_form(), &[("task1_this", "Value1")]);
        match run(&form, &catalog) {
            Err(CoreError::MissingParameters(keys)) => assert_eq!(keys, ["task1_that"]),
            other => panic!("expected MissingParameters, got {other:?}"),
        }
    }

    #[test]
    fn ignores_undefined_params() {
        let catalog = one_task_job(&["this"]);
        let form = with_fields(base_form(), &[("task1_strange", "Value2"), ("task1_this", "Value1")]);
        assert!(run(&form, &catalog).is_ok());
    }

    #[test]
    fn checks_params_across_more_than_one_task() {
        let catalog = vec![job(
            "job1",
            vec![task(1, "task1", &["this"]), task(2, "task2", &["this2"])],
        )];
        let form = with_fields(base_form(), &[("task2_this2", "Value2"), ("task1_this", "Value1")]);
        assert!(run(&form, &catalog).is_ok());

        let partial = with_fields(base_form(), &[("task1_this", "Value1")]);
        assert!(matches!(
            run(&partial, &catalog),
            Err(CoreError::MissingParameters(_))
        ));
    }

    #[test]
    fn rejects_bad_email() {
        let catalog = one_task_job(&[]);
        let mut form = base_form();
        form.email = Some("b".into());
        assert!(matches!(
            run(&form, &catalog),
            Err(CoreError::MalformedRequest(_))
        ));
    }

    #[test]
    fn rejects_unknown_job() {
        let catalog = one_task_job(&[]);
        let mut form = base_form();
        form.job = Some("job34".into());
        assert!(matches!(run(&form, &catalog), Err(CoreError::UnknownJob(name)) if name == "job34"));
    }

    #[test]
    fn missing_or_blank_required_field_is_always_malformed() {
        let catalog = one_task_job(&["this"]);
        let blankers: [fn(&mut SubmissionForm); 7] = [
            |f| f.submission_name = None,
            |f| f.submission_name = Some("   ".into()),
            |f| f.email = None,
            |f| f.email = Some(String::new()),
            |f| f.input_data = None,
            |f| {
                f.input_data = Some(InputData::Upload(InputUpload {
                    filename: "empty.txt".into(),
                    bytes: vec![],
                }))
            },
            |f| f.job = None,
        ];
        for blank in blankers {
            // Malformed regardless of whether the parameters or the job are valid.
            for form in [
                with_fields(base_form(), &[("task1_this", "v")]),
                base_form(),
                SubmissionForm {
                    job: Some("job34".into()),
                    ..base_form()
                },
            ] {
                let mut form = form;
                blank(&mut form);
                assert!(
                    matches!(run(&form, &catalog), Err(CoreError::MalformedRequest(_))),
                    "form {form:?} should be malformed"
                );
            }
        }
    }

    #[test]
    fn rule_violation_is_invalid_parameter() {
        let mut t = task(1, "task1", &["count"]);
        t.parameters[0].rule = ParameterRule::Integer;
        let catalog = vec![job("job1", vec![t])];
        let form = with_fields(base_form(), &[("task1_count", "many")]);
        match run(&form, &catalog) {
            Err(CoreError::InvalidParameter { key, .. }) => assert_eq!(key, "task1_count"),
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn stored_input_is_accepted() {
        let catalog = one_task_job(&[]);
        let mut form = base_form();
        form.input_data = Some(InputData::Stored(BlobRef::new("submissions/x/in.txt")));
        assert!(run(&form, &catalog).is_ok());
    }
}
