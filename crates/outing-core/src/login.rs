/// Show/hide state of the login form's password input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PasswordToggle {
    #[default]
    Hidden,
    Shown,
}

impl PasswordToggle {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Hidden => Self::Shown,
            Self::Shown => Self::Hidden,
        }
    }

    /// The `type` attribute the input should carry.
    pub fn input_type(self) -> &'static str {
        match self {
            Self::Hidden => "password",
            Self::Shown => "text",
        }
    }

    /// Glyph on the toggle button.
    pub fn button_glyph(self) -> &'static str {
        match self {
            Self::Hidden => "👁️",
            Self::Shown => "🙈",
        }
    }
}
