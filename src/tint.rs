use owo_colors::{OwoColorize, Style, Styled};
use supports_color::Stream::Stdout;

/// Styling that degrades to plain text when stdout isn't a colour
/// terminal.
pub trait Tint {
    fn tint(&self, style: Style) -> Styled<&Self>;
}

impl<D> Tint for D {
    fn tint(&self, style: Style) -> Styled<&Self> {
        self.style(
            supports_color::on(Stdout)
                .filter(|f| f.has_basic)
                .map_or_else(Style::new, |_| style),
        )
    }
}
