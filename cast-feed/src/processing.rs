use crate::types::{Cast, FilterSpec};
use crate::utils::{channel_id, normalize_channel};
use std::collections::HashSet;
use tracing::debug;

/// Trait for content filter pipeline stages.
///
/// Stages are pure: the output depends only on `(items, spec)` and the
/// relative order of kept items is preserved.
pub trait FilterStage: Send + Sync {
    /// Keep the items this stage accepts under `spec`
    fn apply(&self, items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast>;

    /// Get the name of this filter stage
    fn stage_name(&self) -> &'static str;
}

/// Keeps authors whose fid lies in `[lower_fid, upper_fid]`
pub struct FidRangeStage;

impl FilterStage for FidRangeStage {
    fn apply(&self, mut items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast> {
        items.retain(|cast| spec.fid_in_range(cast.author.fid));
        items
    }

    fn stage_name(&self) -> &'static str {
        "fid_range"
    }
}

/// Keeps only casts in one of `show_channels`, when any are set
pub struct AllowListStage;

impl FilterStage for AllowListStage {
    fn apply(&self, mut items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast> {
        if spec.show_channels.is_empty() {
            return items;
        }

        let allowed = normalized(spec.show_channels.iter());
        items.retain(|cast| channel_id(cast).is_some_and(|id| allowed.contains(&id)));
        items
    }

    fn stage_name(&self) -> &'static str {
        "allow_list"
    }
}

/// Drops casts in any of `muted_channels`
pub struct MuteListStage;

impl FilterStage for MuteListStage {
    fn apply(&self, mut items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast> {
        if spec.muted_channels.is_empty() {
            return items;
        }

        let muted = normalized(spec.muted_channels.iter());
        items.retain(|cast| !channel_id(cast).is_some_and(|id| muted.contains(&id)));
        items
    }

    fn stage_name(&self) -> &'static str {
        "mute_list"
    }
}

pub struct PowerBadgeStage;

impl FilterStage for PowerBadgeStage {
    fn apply(&self, mut items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast> {
        if spec.is_power_badge_holder {
            items.retain(|cast| cast.author.power_badge);
        }
        items
    }

    fn stage_name(&self) -> &'static str {
        "power_badge"
    }
}

/// Drops casts that have been recast when recasts are excluded
pub struct RecastStage;

impl FilterStage for RecastStage {
    fn apply(&self, mut items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast> {
        if !spec.include_recasts {
            items.retain(|cast| cast.reactions.recasts_count == 0);
        }
        items
    }

    fn stage_name(&self) -> &'static str {
        "recast"
    }
}

/// Fixed-order chain of filter stages
pub struct ContentFilterPipeline {
    stages: Vec<Box<dyn FilterStage>>,
}

impl ContentFilterPipeline {
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(FidRangeStage),
                Box::new(AllowListStage),
                Box::new(MuteListStage),
                Box::new(PowerBadgeStage),
                Box::new(RecastStage),
            ],
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.stage_name()).collect()
    }

    pub fn apply(&self, items: Vec<Cast>, spec: &FilterSpec) -> Vec<Cast> {
        let input_len = items.len();

        let output = self.stages.iter().fold(items, |items, stage| {
            let before = items.len();
            let kept = stage.apply(items, spec);
            if kept.len() != before {
                debug!("Stage {} dropped {} of {} items", stage.stage_name(), before - kept.len(), before);
            }
            kept
        });

        debug!("Filter pipeline kept {}/{} items", output.len(), input_len);
        output
    }
}

impl Default for ContentFilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the standard pipeline to a batch of items
pub fn apply_filters(items: &[Cast], spec: &FilterSpec) -> Vec<Cast> {
    ContentFilterPipeline::new().apply(items.to_vec(), spec)
}

fn normalized<'a>(ids: impl Iterator<Item = &'a String>) -> HashSet<String> {
    ids.map(|id| normalize_channel(id)).filter(|id| !id.is_empty()).collect()
}
