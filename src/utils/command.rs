//! Rendering planned actions as shell commands
//!
//! The planner never runs anything. These helpers describe what an
//! executor would invoke, in the same shape a dry run prints.

use crate::disk::formatting::format_command;
use crate::disk::layouts::SWAP_TABLE_TYPES;
use crate::disk::partitioning::PartitionAction;
use std::fmt;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=%,+@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Join a mount path onto the install target
pub fn target_path(target_root: &str, mount_path: &str) -> String {
    let root = target_root.trim_end_matches('/');
    if root.is_empty() {
        mount_path.to_string()
    } else if mount_path == "/" {
        root.to_string()
    } else {
        format!("{}{}", root, mount_path)
    }
}

/// Filesystem type as `parted mkpart` spells it
fn parted_fs_type(table_type: &str) -> &str {
    let trimmed = table_type.trim();
    if SWAP_TABLE_TYPES.iter().any(|t| t.eq_ignore_ascii_case(trimmed)) {
        "linux-swap"
    } else {
        trimmed
    }
}

/// Commands an executor would run for one action
pub fn render_action(action: &PartitionAction, target_root: &str) -> Vec<ShellCommand> {
    match action {
        PartitionAction::CreateTable { disk, table } => {
            vec![ShellCommand::new("parted", &["-s", disk.as_str(), "mklabel", table.as_str()])]
        }
        PartitionAction::CreatePartition {
            disk,
            table,
            label,
            table_type,
            start_mib,
            end,
            ..
        } => {
            let start = format!("{}MiB", start_mib);
            let end = end.to_string();
            // msdos tables take a partition type where gpt takes a name
            let name = if table == "msdos" {
                "primary"
            } else {
                label.as_str()
            };
            vec![ShellCommand::new(
                "parted",
                &[
                    "-s",
                    disk.as_str(),
                    "mkpart",
                    name,
                    parted_fs_type(table_type),
                    start.as_str(),
                    end.as_str(),
                ],
            )]
        }
        PartitionAction::SetFlag { disk, number, flag } => {
            let number = number.to_string();
            vec![ShellCommand::new(
                "parted",
                &["-s", disk.as_str(), "set", number.as_str(), flag.as_str(), "on"],
            )]
        }
        PartitionAction::FormatPartition {
            device,
            command,
            label,
        } => format_command(device, command, Some(label.as_str()))
            .into_iter()
            .collect(),
        PartitionAction::Mount { device, mount_path } => {
            let target = target_path(target_root, mount_path);
            vec![
                ShellCommand::new("mkdir", &["-p", target.as_str()]),
                ShellCommand::new("mount", &[device.as_str(), target.as_str()]),
            ]
        }
    }
}

/// Render a whole action list
pub fn render_actions(actions: &[PartitionAction], target_root: &str) -> Vec<ShellCommand> {
    actions
        .iter()
        .flat_map(|a| render_action(a, target_root))
        .collect()
}

/// Log a command that would be run
pub fn log_dry_run(command: &ShellCommand) {
    println!("  [plan] {}", command);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::partitioning::PartitionEnd;

    #[test]
    fn renders_parted_steps() {
        let create = PartitionAction::CreatePartition {
            disk: "/dev/sda".to_string(),
            table: "gpt".to_string(),
            number: 1,
            label: "efi".to_string(),
            table_type: "fat32".to_string(),
            start_mib: 1,
            end: PartitionEnd::Mib(513),
        };
        assert_eq!(
            render_action(&create, "/mnt")[0].to_string(),
            "parted -s /dev/sda mkpart efi fat32 1MiB 513MiB"
        );

        let rest = PartitionAction::CreatePartition {
            disk: "/dev/sda".to_string(),
            table: "gpt".to_string(),
            number: 2,
            label: "var".to_string(),
            table_type: "ext4".to_string(),
            start_mib: 513,
            end: PartitionEnd::Remainder,
        };
        assert_eq!(
            render_action(&rest, "/mnt")[0].to_string(),
            "parted -s /dev/sda mkpart var ext4 513MiB 100%"
        );

        let flag = PartitionAction::SetFlag {
            disk: "/dev/nvme0n1".to_string(),
            number: 1,
            flag: "esp".to_string(),
        };
        assert_eq!(
            render_action(&flag, "/mnt")[0].to_string(),
            "parted -s /dev/nvme0n1 set 1 esp on"
        );
    }

    #[test]
    fn swap_and_msdos_use_parted_names() {
        let swap = PartitionAction::CreatePartition {
            disk: "/dev/sda".to_string(),
            table: "gpt".to_string(),
            number: 3,
            label: "swap".to_string(),
            table_type: "linuxswap".to_string(),
            start_mib: 131585,
            end: PartitionEnd::Mib(197121),
        };
        assert_eq!(
            render_action(&swap, "/mnt")[0].to_string(),
            "parted -s /dev/sda mkpart swap linux-swap 131585MiB 197121MiB"
        );

        let legacy = PartitionAction::CreatePartition {
            disk: "/dev/sdb".to_string(),
            table: "msdos".to_string(),
            number: 2,
            label: "data".to_string(),
            table_type: "ext4".to_string(),
            start_mib: 1025,
            end: PartitionEnd::Remainder,
        };
        assert_eq!(
            render_action(&legacy, "/mnt")[0].to_string(),
            "parted -s /dev/sdb mkpart primary ext4 1025MiB 100%"
        );
    }

    #[test]
    fn renders_mount_under_target_root() {
        let mount = PartitionAction::Mount {
            device: "/dev/sda2".to_string(),
            mount_path: "/boot/efi".to_string(),
        };
        let cmds: Vec<String> = render_action(&mount, "/mnt/")
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(cmds, vec!["mkdir -p /mnt/boot/efi", "mount /dev/sda2 /mnt/boot/efi"]);
    }

    #[test]
    fn target_paths() {
        assert_eq!(target_path("/mnt", "/"), "/mnt");
        assert_eq!(target_path("/", "/home"), "/home");
        assert_eq!(target_path("", "/"), "/");
        assert_eq!(target_path("/mnt", "/var"), "/mnt/var");
    }

    #[test]
    fn quotes_unsafe_arguments() {
        let cmd = ShellCommand::new("mkfs.ext4", &["-L", "my data", "/dev/sda1"]);
        assert_eq!(cmd.to_string(), "mkfs.ext4 -L 'my data' /dev/sda1");
        let cmd = ShellCommand::new("echo", &["it's"]);
        assert_eq!(cmd.to_string(), r"echo 'it'\''s'");
    }
}
