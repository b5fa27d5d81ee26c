use crate::config::DEFAULT_MAX_STEPS;

/// Which family, adviser and follow-up step the form is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    family_id: String,
    adviser_id: String,
    step: u32,
    max_steps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackNavigation {
    /// Moved to the previous step; reload it
    Step(u32),
    /// Already at the first step; leave the form
    ExitToFamilies,
}

impl SessionContext {
    pub fn open(family_id: impl Into<String>, adviser_id: impl Into<String>, max_steps: u32) -> Self {
        Self {
            family_id: family_id.into(),
            adviser_id: adviser_id.into(),
            step: 1,
            max_steps: if max_steps == 0 { DEFAULT_MAX_STEPS } else { max_steps },
        }
    }

    pub fn family_id(&self) -> &str {
        &self.family_id
    }

    pub fn adviser_id(&self) -> &str {
        &self.adviser_id
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Folder holding every follow-up of this family
    pub fn document_key(&self) -> String {
        format!("documento_{}_{}", self.family_id, self.adviser_id)
    }

    pub fn step_key(&self) -> String {
        format!("seguimiento_{}", self.step)
    }

    /// Document key as the upload route expects it, without the prefix
    pub fn upload_key(&self) -> String {
        format!("{}_{}", self.family_id, self.adviser_id)
    }

    /// Jumps to the step the server asked for. Out of range values are
    /// clamped.
    pub fn advance_to(&mut self, next: u32) {
        self.step = next.clamp(1, self.max_steps);
    }

    pub fn go_back(&mut self) -> BackNavigation {
        if self.step > 1 {
            self.step -= 1;
            BackNavigation::Step(self.step)
        } else {
            BackNavigation::ExitToFamilies
        }
    }

    pub fn is_step_reached(&self, index: u32) -> bool {
        index < self.step
    }

    pub fn progress_label(&self) -> String {
        format!("Paso {} de {}", self.step, self.max_steps)
    }

    pub fn form_title(&self) -> String {
        format!("Seguimiento {} - Familia {}", self.step, self.family_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let session = SessionContext::open("1001456000", "1002", 8);

        assert_eq!(session.document_key(), "documento_1001456000_1002");
        assert_eq!(session.step_key(), "seguimiento_1");
        assert_eq!(session.upload_key(), "1001456000_1002");
    }

    #[test]
    fn test_navigation() {
        let mut session = SessionContext::open("55", "1001", 8);
        session.advance_to(3);
        assert_eq!(session.step_key(), "seguimiento_3");
        assert_eq!(session.progress_label(), "Paso 3 de 8");
        assert_eq!(session.form_title(), "Seguimiento 3 - Familia 55");

        assert_eq!(session.go_back(), BackNavigation::Step(2));
        assert_eq!(session.go_back(), BackNavigation::Step(1));
        assert_eq!(session.go_back(), BackNavigation::ExitToFamilies);
        assert_eq!(session.step(), 1);
    }

    #[test]
    fn test_advance_is_clamped() {
        let mut session = SessionContext::open("55", "1001", 8);
        session.advance_to(12);
        assert_eq!(session.step(), 8);
        session.advance_to(0);
        assert_eq!(session.step(), 1);
    }

    #[test]
    fn test_progress_steps() {
        let mut session = SessionContext::open("55", "1001", 0);
        assert_eq!(session.max_steps(), DEFAULT_MAX_STEPS);

        session.advance_to(2);
        let reached: Vec<_> = (0..4).map(|i| session.is_step_reached(i)).collect();
        assert_eq!(reached, [true, true, false, false]);
    }
}
