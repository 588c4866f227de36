use fail::FailScenario;

/// Configures failpoints for the lifetime of a test and switches them off on drop.
///
/// Holds the global [`FailScenario`] lock, so tests using it run one at a time.
pub struct MergerFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> MergerFailScenario<'a> {
    /// Applies each `(failpoint, action)` pair, e.g. `("batch_merge.before_purge", "1*off->return")`.
    ///
    /// # Panics
    /// Panics if an action cannot be parsed.
    pub fn setup(failpoints: &[(&str, &str)]) -> MergerFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).expect("Failed to configure failpoint");
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }
}

impl Drop for MergerFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            let _ = fail::cfg(failpoint.as_str(), "off");
        }
    }
}
