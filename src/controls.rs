use tracing::trace;

/// Tab cycle over the interactive controls. The quick-search box is
/// reached with `/` instead and handled as raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Table,
    PlayerFilter,
    GameFilter,
    StatFocus,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Table => Focus::PlayerFilter,
            Focus::PlayerFilter => Focus::GameFilter,
            Focus::GameFilter => Focus::StatFocus,
            Focus::StatFocus => Focus::Table,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Focus::Table => Focus::StatFocus,
            Focus::PlayerFilter => Focus::Table,
            Focus::GameFilter => Focus::PlayerFilter,
            Focus::StatFocus => Focus::GameFilter,
        }
    }
}

/// One selectable filter control: a placeholder ("All ...") at slot zero
/// followed by one option per facet value.
pub struct SelectControl {
    pub label: String,
    placeholder: String,
    options: Vec<String>,
    selected: usize,
}

impl SelectControl {
    pub fn new(label: &str, placeholder: &str) -> Self {
        Self {
            label: label.to_string(),
            placeholder: placeholder.to_string(),
            options: Vec::new(),
            selected: 0,
        }
    }

    /// Replace the option list wholesale and reset the selection. Safe to
    /// call again on reload; nothing from the previous binding survives.
    pub fn bind(&mut self, options: &[String]) {
        trace!("Bind {}: {} options", self.label, options.len());
        self.options = options.to_vec();
        self.selected = 0;
    }

    /// The selected facet value, or `None` on the placeholder.
    pub fn value(&self) -> Option<&str> {
        if self.selected == 0 {
            None
        } else {
            self.options.get(self.selected - 1).map(String::as_str)
        }
    }

    pub fn display(&self) -> &str {
        self.value().unwrap_or(&self.placeholder)
    }

    pub fn select_next(&mut self) {
        if self.selected < self.options.len() {
            self.selected += 1;
        } else {
            self.selected = 0; // wrap back to the placeholder
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        } else {
            self.selected = self.options.len();
        }
    }

    pub fn clear(&mut self) {
        self.selected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_the_empty_selection() {
        let mut control = SelectControl::new("Player", "All players");
        control.bind(&["Ann".to_string(), "Bo".to_string()]);
        assert_eq!(control.value(), None);
        assert_eq!(control.display(), "All players");

        control.select_next();
        assert_eq!(control.value(), Some("Ann"));
        control.select_next();
        assert_eq!(control.value(), Some("Bo"));
        control.select_next();
        assert_eq!(control.value(), None); // wrapped
        control.select_prev();
        assert_eq!(control.value(), Some("Bo"));
    }

    #[test]
    fn rebinding_discards_previous_options_and_selection() {
        let mut control = SelectControl::new("Game", "All games");
        control.bind(&["Chess".to_string()]);
        control.select_next();
        assert_eq!(control.value(), Some("Chess"));

        control.bind(&["Go".to_string(), "Shogi".to_string()]);
        assert_eq!(control.value(), None);
        control.select_next();
        assert_eq!(control.value(), Some("Go"));
    }
}
