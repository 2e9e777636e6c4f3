#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub index: usize,
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub steps: Vec<StepMetrics>,
}

impl PipelineMetrics {
    pub fn step_duration_ms(&self, name: &str) -> Option<u128> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| step.duration_ms)
    }

    /// Log each completed step at debug level.
    pub fn log_steps(&self) {
        for step in &self.steps {
            tracing::debug!(
                step = %step.name,
                duration_ms = step.duration_ms,
                "Step completed"
            );
        }
        tracing::debug!(
            total_duration_ms = self.total_duration_ms,
            steps = self.steps.len(),
            "Pipeline finished"
        );
    }
}
