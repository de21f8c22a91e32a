//! Filesystem creation commands

use crate::utils::command::ShellCommand;
use crate::utils::error::{DiskplanError, Result};

fn tool_name(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

/// Label option for a filesystem creation tool, `None` if it takes none
fn label_flag(program: &str) -> Option<&'static str> {
    match tool_name(program) {
        "mkfs.fat" | "mkfs.vfat" | "mkfs.msdos" | "mkdosfs" => Some("-n"),
        "mkfs.f2fs" => Some("-l"),
        "mkfs.ext2" | "mkfs.ext3" | "mkfs.ext4" | "mke2fs" | "mkfs.btrfs" | "mkfs.xfs"
        | "mkswap" => Some("-L"),
        _ => None,
    }
}

/// Longest label (in bytes) a tool stores without cutting it short
fn label_max(program: &str) -> Option<usize> {
    match tool_name(program) {
        "mkfs.fat" | "mkfs.vfat" | "mkfs.msdos" | "mkdosfs" => Some(11),
        "mkfs.xfs" => Some(12),
        "mkfs.ext2" | "mkfs.ext3" | "mkfs.ext4" | "mke2fs" | "mkswap" => Some(16),
        _ => None,
    }
}

/// Check that formatting with `command` leaves exactly `label` on the
/// filesystem, so later runs recognise the partition by it.
pub fn validate_label(command: &str, label: &str) -> Result<()> {
    let mut words = command.split_whitespace();
    let Some(program) = words.next() else {
        return Ok(());
    };

    if let Some(flag) = label_flag(program) {
        let args: Vec<&str> = words.collect();
        if let Some(pos) = args.iter().position(|a| *a == flag) {
            match args.get(pos + 1) {
                Some(given) if given.eq_ignore_ascii_case(label) => {}
                Some(given) => {
                    return Err(DiskplanError::ValidationError(format!(
                        "Partition '{}' format command sets label '{}'",
                        label, given
                    )))
                }
                None => {
                    return Err(DiskplanError::ValidationError(format!(
                        "Partition '{}' format command ends with {} and no label",
                        label, flag
                    )))
                }
            }
        }
    }

    if let Some(max) = label_max(program) {
        if label.len() > max {
            return Err(DiskplanError::ValidationError(format!(
                "Partition label '{}' is longer than the {} bytes {} keeps",
                label,
                max,
                tool_name(program)
            )));
        }
    }

    Ok(())
}

/// Build the command that formats `partition`.
///
/// `command` is the declared creation command (e.g., "mkfs.fat -F32").
/// When a label is given and the tool has a label option, it is inserted
/// before the device so the filesystem can be found again by label.
pub fn format_command(partition: &str, command: &str, label: Option<&str>) -> Option<ShellCommand> {
    let mut words = command.split_whitespace();
    let program = words.next()?;
    let mut args: Vec<String> = words.map(str::to_string).collect();

    if let (Some(label), Some(flag)) = (label, label_flag(program)) {
        if !args.iter().any(|a| a == flag) {
            let label = if flag == "-n" {
                label.to_uppercase()
            } else {
                label.to_string()
            };
            args.push(flag.to_string());
            args.push(label);
        }
    }

    args.push(partition.to_string());

    Some(ShellCommand {
        program: program.to_string(),
        args,
    })
}
