//! Session state for the enrollment and validation flows
//!
//! This module is pure state: it never touches the network or the microphone.
//! Flows stage recorded takes through the transition methods here and gate
//! every submit on the precondition checks, so a rejected submit never costs a
//! network call.

use thiserror::Error;

/// Number of enrollment takes the server expects by default
pub const REQUIRED_TAKES: usize = 20;

/// Which flow the session is driving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Enroll,
    Validate,
}

/// Precondition failures checked before any network call
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Please enter a user ID")]
    MissingUserId,
    #[error("Recorded {have} of {need} sentences; record all of them before submitting")]
    IncompleteBatch { have: usize, need: usize },
    #[error("Please record your voice first")]
    MissingAudio,
    #[error("The batch already holds all {0} takes")]
    BatchFull(usize),
}

/// One completed take: the prompt that was read and its WAV bytes
#[derive(Debug, Clone)]
pub struct RecordedTake {
    pub sentence: String,
    pub wav: Vec<u8>,
}

/// Ordered, append-only collection of enrollment takes with a fixed cap
#[derive(Debug, Clone)]
pub struct EnrollmentBatch {
    takes: Vec<RecordedTake>,
    required: usize,
}

impl EnrollmentBatch {
    pub fn new(required: usize) -> Self {
        Self {
            takes: Vec::with_capacity(required),
            required,
        }
    }

    /// Append a take; fails once the batch holds the required count
    pub fn push(&mut self, take: RecordedTake) -> Result<(), SubmitError> {
        if self.takes.len() >= self.required {
            return Err(SubmitError::BatchFull(self.required));
        }
        self.takes.push(take);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.takes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.takes.is_empty()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Submission is only permitted once the count is exactly met
    pub fn is_complete(&self) -> bool {
        self.takes.len() == self.required
    }

    pub fn takes(&self) -> &[RecordedTake] {
        &self.takes
    }
}

/// One validation cycle: prompt, staged audio, and the server's verdict
#[derive(Debug, Clone, Default)]
pub struct ValidationAttempt {
    pub sentence: Option<String>,
    pub wav: Option<Vec<u8>>,
    pub outcome: Option<bool>,
}

impl ValidationAttempt {
    /// Fresh prompt, fresh audio, fresh outcome
    pub fn reset(&mut self) {
        self.sentence = None;
        self.wav = None;
        self.outcome = None;
    }
}

/// All transient state for one CLI run, owned here and mutated only through
/// the methods below
#[derive(Debug)]
pub struct Session {
    view: View,
    user_id: String,
    message: String,
    batch: EnrollmentBatch,
    attempt: ValidationAttempt,
}

impl Session {
    pub fn new(view: View, user_id: impl Into<String>, required_takes: usize) -> Self {
        Self {
            view,
            user_id: user_id.into(),
            message: String::new(),
            batch: EnrollmentBatch::new(required_takes),
            attempt: ValidationAttempt::default(),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn batch(&self) -> &EnrollmentBatch {
        &self.batch
    }

    pub fn attempt(&self) -> &ValidationAttempt {
        &self.attempt
    }

    /// Switch flows; entering the validate view always discards any prior
    /// attempt so no stale prompt, audio, or outcome leaks across cycles
    pub fn select_view(&mut self, view: View) {
        self.view = view;
        self.message.clear();

        if view == View::Validate {
            self.attempt.reset();
        }
    }

    /// Stage a completed enrollment take
    pub fn stage_take(&mut self, take: RecordedTake) -> Result<(), SubmitError> {
        self.batch.push(take)
    }

    /// Stage the validation audio, with its prompt when the flow used one
    pub fn stage_validation(&mut self, sentence: Option<String>, wav: Vec<u8>) {
        self.attempt.sentence = sentence;
        self.attempt.wav = Some(wav);
        self.attempt.outcome = None;
    }

    /// Record the server's verdict for the current attempt
    pub fn record_outcome(&mut self, verified: bool) {
        self.attempt.outcome = Some(verified);
    }

    /// Gate for `/enroll`: needs a user id and a complete batch
    pub fn check_enrollment(&self) -> Result<(), SubmitError> {
        if self.user_id.trim().is_empty() {
            return Err(SubmitError::MissingUserId);
        }
        if !self.batch.is_complete() {
            return Err(SubmitError::IncompleteBatch {
                have: self.batch.len(),
                need: self.batch.required(),
            });
        }
        Ok(())
    }

    /// Gate for `/validate_trial` and `/verify`: needs a user id and audio
    pub fn check_validation(&self) -> Result<(), SubmitError> {
        if self.user_id.trim().is_empty() {
            return Err(SubmitError::MissingUserId);
        }
        if self.attempt.wav.is_none() {
            return Err(SubmitError::MissingAudio);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(sentence: &str) -> RecordedTake {
        RecordedTake {
            sentence: sentence.to_string(),
            wav: vec![0x52, 0x49, 0x46, 0x46],
        }
    }

    fn full_session(required: usize) -> Session {
        let mut session = Session::new(View::Enroll, "alice", required);
        for i in 0..required {
            session.stage_take(take(&format!("sentence {}", i))).unwrap();
        }
        session
    }

    #[test]
    fn test_enrollment_rejected_for_every_incomplete_length() {
        for have in 0..REQUIRED_TAKES {
            let mut session = Session::new(View::Enroll, "alice", REQUIRED_TAKES);
            for i in 0..have {
                session.stage_take(take(&format!("sentence {}", i))).unwrap();
            }
            assert_eq!(
                session.check_enrollment(),
                Err(SubmitError::IncompleteBatch {
                    have,
                    need: REQUIRED_TAKES,
                }),
            );
        }
    }

    #[test]
    fn test_enrollment_accepted_when_batch_complete() {
        assert_eq!(full_session(REQUIRED_TAKES).check_enrollment(), Ok(()));
    }

    #[test]
    fn test_enrollment_rejected_without_user_id() {
        let mut session = full_session(3);
        session.user_id = "   ".to_string();
        assert_eq!(session.check_enrollment(), Err(SubmitError::MissingUserId));
    }

    #[test]
    fn test_batch_is_capped() {
        let mut batch = EnrollmentBatch::new(2);
        batch.push(take("one")).unwrap();
        batch.push(take("two")).unwrap();
        assert_eq!(batch.push(take("three")), Err(SubmitError::BatchFull(2)));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_validation_rejected_without_user_id_or_audio() {
        let mut session = Session::new(View::Validate, "", REQUIRED_TAKES);
        session.stage_validation(Some("prompt".to_string()), vec![1, 2, 3]);
        assert_eq!(session.check_validation(), Err(SubmitError::MissingUserId));

        let session = Session::new(View::Validate, "alice", REQUIRED_TAKES);
        assert_eq!(session.check_validation(), Err(SubmitError::MissingAudio));
    }

    #[test]
    fn test_validation_accepted_with_user_and_audio() {
        let mut session = Session::new(View::Validate, "alice", REQUIRED_TAKES);
        session.stage_validation(Some("prompt".to_string()), vec![1, 2, 3]);
        assert_eq!(session.check_validation(), Ok(()));
    }

    #[test]
    fn test_switching_to_validate_resets_attempt() {
        let mut session = Session::new(View::Enroll, "alice", REQUIRED_TAKES);
        session.stage_validation(Some("old prompt".to_string()), vec![9, 9]);
        session.record_outcome(true);
        session.set_message("leftover");

        session.select_view(View::Validate);

        assert_eq!(session.attempt().sentence, None);
        assert_eq!(session.attempt().wav, None);
        assert_eq!(session.attempt().outcome, None);
        assert_eq!(session.message(), "");
    }

    #[test]
    fn test_switching_to_enroll_keeps_batch() {
        let mut session = Session::new(View::Validate, "alice", REQUIRED_TAKES);
        session.stage_take(take("kept")).unwrap();
        session.select_view(View::Enroll);
        assert_eq!(session.view(), View::Enroll);
        assert_eq!(session.batch().len(), 1);
    }

    #[test]
    fn test_stage_validation_clears_prior_outcome() {
        let mut session = Session::new(View::Validate, "alice", REQUIRED_TAKES);
        session.stage_validation(Some("first".to_string()), vec![1]);
        session.record_outcome(false);
        session.stage_validation(Some("second".to_string()), vec![2]);
        assert_eq!(session.attempt().outcome, None);
    }
}
