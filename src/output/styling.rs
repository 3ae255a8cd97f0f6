use console::{style, Style, StyledObject};
use std::fmt::Display;

use super::status::display_name;
use crate::builds::BuildStatus;

fn paint(text: impl Display, with: &Style) -> StyledObject<String> {
    with.apply_to(text.to_string())
}

pub fn bright_yellow(text: impl Display) -> StyledObject<String> {
    paint(text, &Style::new().bright().yellow())
}

pub fn bright_green(text: impl Display) -> StyledObject<String> {
    paint(text, &Style::new().bright().green())
}

pub fn bright_red(text: impl Display) -> StyledObject<String> {
    paint(text, &Style::new().bright().red())
}

pub fn cyan(text: impl Display) -> StyledObject<String> {
    paint(text, &Style::new().cyan())
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    paint(text, &Style::new().dim())
}

pub fn bright(text: impl Display) -> StyledObject<String> {
    paint(text, &Style::new().bright())
}

pub fn magenta_bold(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Status name coloured green for success, red for failures, yellow otherwise.
pub fn styled_status(status: BuildStatus) -> StyledObject<String> {
    let name = display_name(status);
    match status {
        BuildStatus::Success => bright_green(name),
        BuildStatus::Failed | BuildStatus::Error | BuildStatus::Failing => bright_red(name),
        _ => bright_yellow(name),
    }
}
