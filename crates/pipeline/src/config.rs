//! Pipeline-level configuration (spec.md §9 Open Questions).

/// `merge_label` is the case-insensitive label the Eligibility Filter looks
/// for. `attach_wip_label` toggles the `WIP`-label side effect; per §9 it
/// defaults off.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub merge_label: String,
    pub attach_wip_label: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_label: "LGTM".to_string(),
            attach_wip_label: false,
        }
    }
}
