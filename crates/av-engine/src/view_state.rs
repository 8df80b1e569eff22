//! User-controlled view inputs.
//!
//! Every input carries the revision at which it last changed, taken from one
//! logical clock shared by the whole session. Setting a field to the value it
//! already holds leaves its revision alone, so downstream artifacts keyed by
//! that revision stay valid.

use av_core::{AxisRange, CoreResult, InstanceId, RunId};
use serde::{Deserialize, Serialize};

/// Logical time stamp of a change.
pub type Revision = u64;

/// The user-facing inputs of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Instance,
    SelectedRun,
    ShowBands,
    Viewport,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Instance,
        Field::SelectedRun,
        Field::ShowBands,
        Field::Viewport,
    ];

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Visible axis ranges last set by pan/zoom. `None` on an axis means auto-fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportRange {
    pub x: Option<AxisRange>,
    pub y: Option<AxisRange>,
}

impl ViewportRange {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> CoreResult<Self> {
        Ok(Self {
            x: Some(AxisRange::new(x_min, x_max, "x")?),
            y: Some(AxisRange::new(y_min, y_max, "y")?),
        })
    }

    pub fn is_auto(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }
}

/// A pan/zoom notification from the rendering surface.
///
/// A drag on one axis reports only that axis; a double-click reports an
/// autorange reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelayoutEvent {
    pub x: Option<AxisRange>,
    pub y: Option<AxisRange>,
    pub autorange: bool,
}

impl RelayoutEvent {
    /// Merges this event into the viewport currently stored.
    pub fn apply_to(&self, current: Option<ViewportRange>) -> Option<ViewportRange> {
        if self.autorange {
            return None;
        }
        let mut next = current.unwrap_or_default();
        if let Some(x) = self.x {
            next.x = Some(x);
        }
        if let Some(y) = self.y {
            next.y = Some(y);
        }
        (!next.is_auto()).then_some(next)
    }
}

/// What happens to a stored viewport when the instance changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportPolicy {
    /// Drop the viewport so the new instance auto-fits.
    #[default]
    ResetOnInstanceChange,
    /// Keep the previous instance's axis ranges.
    Preserve,
}

/// Who set the selected run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionOrigin {
    /// Derived from the loaded runs; re-derived whenever they change.
    #[default]
    Auto,
    /// Picked by the user; kept until the instance changes.
    User,
}

/// Inputs of one view, each stamped with the revision of its last change.
#[derive(Debug, Clone)]
pub struct ViewState {
    instance: Option<InstanceId>,
    selected_run: Option<RunId>,
    selection_origin: SelectionOrigin,
    show_bands: bool,
    viewport: Option<ViewportRange>,
    revisions: [Revision; 4],
    clock: Revision,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ViewState {
    pub fn new(show_bands: bool) -> Self {
        Self {
            instance: None,
            selected_run: None,
            selection_origin: SelectionOrigin::Auto,
            show_bands,
            viewport: None,
            revisions: [0; 4],
            clock: 0,
        }
    }

    pub fn instance(&self) -> Option<&InstanceId> {
        self.instance.as_ref()
    }

    pub fn selected_run(&self) -> Option<RunId> {
        self.selected_run
    }

    pub fn selection_origin(&self) -> SelectionOrigin {
        self.selection_origin
    }

    pub fn show_bands(&self) -> bool {
        self.show_bands
    }

    pub fn viewport(&self) -> Option<&ViewportRange> {
        self.viewport.as_ref()
    }

    pub fn revision(&self, field: Field) -> Revision {
        self.revisions[field.slot()]
    }

    /// Advances the logical clock and returns the new time.
    pub fn tick(&mut self) -> Revision {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, field: Field) {
        let now = self.tick();
        self.revisions[field.slot()] = now;
    }

    /// Returns whether the value changed. A new instance hands the run
    /// selection back to automatic derivation.
    pub fn set_instance(&mut self, instance: InstanceId) -> bool {
        if self.instance.as_ref() == Some(&instance) {
            return false;
        }
        self.instance = Some(instance);
        self.selection_origin = SelectionOrigin::Auto;
        self.touch(Field::Instance);
        true
    }

    /// Records a user's pick. The origin becomes [`SelectionOrigin::User`]
    /// even when the run equals the one already selected.
    pub fn choose_run(&mut self, run: RunId) -> bool {
        self.selection_origin = SelectionOrigin::User;
        self.set_run(Some(run))
    }

    /// Sets a derived selection. Ignored once the user has picked a run.
    pub fn derive_run(&mut self, run: Option<RunId>) -> bool {
        if self.selection_origin == SelectionOrigin::User {
            return false;
        }
        self.set_run(run)
    }

    fn set_run(&mut self, run: Option<RunId>) -> bool {
        if self.selected_run == run {
            return false;
        }
        self.selected_run = run;
        self.touch(Field::SelectedRun);
        true
    }

    pub fn set_show_bands(&mut self, show: bool) -> bool {
        if self.show_bands == show {
            return false;
        }
        self.show_bands = show;
        self.touch(Field::ShowBands);
        true
    }

    pub fn set_viewport(&mut self, viewport: Option<ViewportRange>) -> bool {
        if self.viewport == viewport {
            return false;
        }
        self.viewport = viewport;
        self.touch(Field::Viewport);
        true
    }
}
