use comfy_table::Color;

use crate::builds::BuildStatus;

/// Higher is worse. Drives the headline status of a build list.
pub fn severity(status: BuildStatus) -> u8 {
    match status {
        BuildStatus::Failed | BuildStatus::Error => 6,
        BuildStatus::Failing => 5,
        BuildStatus::Running => 4,
        BuildStatus::OnHold => 3,
        BuildStatus::Canceled | BuildStatus::NotRun | BuildStatus::Unknown => 2,
        BuildStatus::Success => 1,
    }
}

pub fn display_name(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Success => "Success",
        BuildStatus::Running => "Running",
        BuildStatus::NotRun => "Not Run",
        BuildStatus::Failed => "Failed",
        BuildStatus::Error => "Error",
        BuildStatus::Failing => "Failing",
        BuildStatus::OnHold => "On Hold",
        BuildStatus::Canceled => "Canceled",
        BuildStatus::Unknown => "Unknown",
    }
}

pub fn color(status: BuildStatus) -> Color {
    match status {
        BuildStatus::Success => Color::Green,
        BuildStatus::Running => Color::Blue,
        BuildStatus::Failed | BuildStatus::Error | BuildStatus::Failing => Color::Red,
        BuildStatus::OnHold => Color::Magenta,
        BuildStatus::NotRun | BuildStatus::Canceled | BuildStatus::Unknown => Color::Grey,
    }
}

/// The most severe status of the set, `Unknown` when empty.
///
/// Ties between equally severe statuses go to the first one seen.
pub fn worst_status(statuses: impl IntoIterator<Item = BuildStatus>) -> BuildStatus {
    statuses
        .into_iter()
        .fold(None, |worst: Option<BuildStatus>, status| match worst {
            Some(current) if severity(current) >= severity(status) => Some(current),
            _ => Some(status),
        })
        .unwrap_or(BuildStatus::Unknown)
}
