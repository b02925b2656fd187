/// Screens of the application, one of which is visible at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Analyze and download one URL
    #[default]
    Single,
    /// Line-by-line URLs and playlist preview
    Batch,
    /// Tasks currently queued or running
    Downloading,
    /// Download history
    Finished,
    Settings,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Single,
        View::Batch,
        View::Downloading,
        View::Finished,
        View::Settings,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Single => "🎬 Single video",
            View::Batch => "📚 Batch & playlist",
            View::Downloading => "⏳ Downloading",
            View::Finished => "✅ History",
            View::Settings => "⚙ Settings",
        }
    }

    /// Whether this view renders live task state
    pub fn shows_tasks(self) -> bool {
        self == View::Downloading
    }
}

/// Work the caller has to perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    RefreshHistory,
}

#[derive(Debug, Default)]
pub struct ViewRouter {
    active: View,
}

impl ViewRouter {
    pub fn active(&self) -> View {
        self.active
    }

    /// User navigation. Every state is reachable from every other; entering
    /// the history view always asks for a fresh history list.
    pub fn navigate(&mut self, to: View) -> Transition {
        self.active = to;
        if to == View::Finished {
            Transition::RefreshHistory
        } else {
            Transition::None
        }
    }

    /// Jump performed after a download has been queued.
    pub fn force_downloading(&mut self) {
        self.active = View::Downloading;
    }
}
