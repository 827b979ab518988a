//! Upload form state

use crate::record::parse_steps;

/// Name and step count as typed by the participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    name: String,
    steps: String,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Keep only the digit characters of `input`
    pub fn set_steps(&mut self, input: &str) {
        self.steps = input.chars().filter(|c| c.is_ascii_digit()).collect();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &str {
        &self.steps
    }

    /// Parsed step count, `None` when it overflows
    pub fn step_count(&self) -> Option<u32> {
        parse_steps(&self.steps)
    }

    pub fn can_submit(&self) -> bool {
        !self.name.trim().is_empty() && !self.steps.is_empty()
    }

    /// Forget the entered values after a successful upload
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
