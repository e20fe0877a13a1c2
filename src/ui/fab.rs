use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{models::SkipCategory, settings::CleanContentRule};

use super::notifications::format_types;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStatus {
    #[default]
    Detecting,
    Loading,
    Ready,
    NotRecognized,
}

/// What a press of the skip button should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabAction {
    RequestAuth,
    /// Nothing to skip and nothing running.
    Ignore,
    Stop,
    /// Exactly one category available: start right away.
    AutoStart(SkipCategory),
    OpenQuickPanel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabView {
    pub label: String,
    pub active: bool,
    pub disabled: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonVisibility {
    pub skip_button: bool,
    pub mark_button: bool,
}

/// Display state of the in-player skip button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FabState {
    pub authenticated: bool,
    pub skipping: bool,
    pub loading: LoadingStatus,
    pub available: Vec<SkipCategory>,
    pub active: BTreeSet<SkipCategory>,
    pub is_clean: bool,
}

impl FabState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&mut self, types: Vec<SkipCategory>, is_clean: bool) {
        self.available = types;
        self.is_clean = is_clean;
        self.loading = LoadingStatus::Ready;
    }

    pub fn set_loading(&mut self, status: LoadingStatus) {
        self.loading = status;
        if status != LoadingStatus::Ready {
            self.is_clean = false;
        }
    }

    pub fn set_skipping(&mut self, skipping: bool, active: BTreeSet<SkipCategory>) {
        self.skipping = skipping;
        self.active = if skipping { active } else { BTreeSet::new() };
    }

    /// New title in the same tab: forget what we knew about the old one.
    pub fn reset_for_new_video(&mut self) {
        self.available.clear();
        self.is_clean = false;
        self.loading = LoadingStatus::Detecting;
    }

    pub fn view(&self) -> FabView {
        if !self.authenticated && !self.skipping {
            return FabView {
                label: "Sign in to skip".into(),
                active: false,
                disabled: false,
                locked: true,
            };
        }

        let (label, active, disabled) = if self.skipping {
            let types = format_types(&self.active);
            let label = match (types.is_empty(), self.active.len() >= 3) {
                (true, _) => "Skipping".to_string(),
                (false, true) => format!("Skipping {types}"),
                (false, false) => format!("Skipping {types} scenes"),
            };
            (label, true, false)
        } else if !self.available.is_empty() {
            let types = format_types(&self.available);
            let label = if self.available.len() >= 3 {
                format!("Skip {types}")
            } else {
                format!("Skip {types} scenes")
            };
            (label, false, false)
        } else {
            match self.loading {
                LoadingStatus::NotRecognized => ("Content not recognized".into(), false, true),
                LoadingStatus::Detecting => ("Detecting content...".into(), false, false),
                LoadingStatus::Loading => ("Loading skips...".into(), false, false),
                LoadingStatus::Ready if self.is_clean => ("No skips (clean)".into(), false, true),
                LoadingStatus::Ready => ("No skips yet".into(), false, true),
            }
        };

        FabView {
            label,
            active,
            disabled,
            locked: !self.authenticated,
        }
    }

    pub fn click(&self) -> FabAction {
        if self.skipping {
            return FabAction::Stop;
        }
        if !self.authenticated {
            return FabAction::RequestAuth;
        }

        match self.available.as_slice() {
            [] => FabAction::Ignore,
            [only] => FabAction::AutoStart(*only),
            _ => FabAction::OpenQuickPanel,
        }
    }

    pub fn visibility(&self, rule: CleanContentRule) -> ButtonVisibility {
        let clean = self.is_clean && self.loading == LoadingStatus::Ready && !self.skipping;
        ButtonVisibility {
            skip_button: !(clean && rule.hides_skip_button()),
            mark_button: !(clean && rule.hides_mark_button()),
        }
    }
}
