//! POSIX shell snippets run on a job to write files.
//!
//! Content is always streamed through stdin so nothing secret ends up in
//! the remote process list. Paths starting with `~/` are resolved against
//! `$HOME` of the login user.

/// Quotes `path` as a single shell word, keeping a leading `~/` expandable.
pub fn shell_path(path: &str) -> String {
    if path == "~" {
        "\"$HOME\"".to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("\"$HOME\"/{}", shell_quote(rest))
    } else {
        shell_quote(path)
    }
}

pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Replaces the file at `path` with stdin and applies `mode`.
///
/// The old file is removed first so a read-only copy from a previous run
/// does not block the write.
pub fn upload_command(path: &str, mode: u32) -> String {
    let target = shell_path(path);
    format!(
        "set -e; umask 077; mkdir -p \"$(dirname {target})\"; rm -f {target}; \
         cat > {target}; chmod {mode:o} {target}"
    )
}

/// Appends stdin to the file at `path` without touching existing bytes.
///
/// A newline is added first when the file is non-empty and lacks a trailing
/// one, so the appended line always becomes a separate entry.
pub fn append_command(path: &str) -> String {
    let target = shell_path(path);
    format!(
        "set -e; umask 077; mkdir -p \"$(dirname {target})\"; \
         if [ -s {target} ] && [ -n \"$(tail -c 1 {target})\" ]; then echo >> {target}; fi; \
         cat >> {target}; chmod 600 {target}"
    )
}

/// Normalises `line` to exactly one newline terminated line.
pub fn line_payload(line: &str) -> String {
    format!("{}\n", line.trim_end_matches(['\r', '\n']))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::process::{Command, Stdio};

    fn run_in_home(home: &Path, command: &str, stdin: &[u8]) {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("HOME", home)
            .current_dir(home)
            .stdin(Stdio::piped())
            .spawn()
            .unwrap();
        child.stdin.take().unwrap().write_all(stdin).unwrap();
        let status = child.wait().unwrap();
        assert!(status.success(), "command failed: {command}");
    }

    #[test]
    fn quoting_keeps_home_expandable() {
        assert_eq!(shell_path("~/.ssh/id_tunnel"), "\"$HOME\"/'.ssh/id_tunnel'");
        assert_eq!(shell_path("/tmp/it's"), r"'/tmp/it'\''s'");
        assert_eq!(shell_path("~"), "\"$HOME\"");
    }

    #[test]
    fn upload_writes_content_with_mode() {
        let home = tempfile::tempdir().unwrap();

        run_in_home(home.path(), &upload_command("~/key.pem", 0o400), b"secret\n");

        let path = home.path().join("key.pem");
        assert_eq!(fs::read_to_string(&path).unwrap(), "secret\n");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o400);
    }

    #[test]
    fn upload_replaces_read_only_file() {
        let home = tempfile::tempdir().unwrap();
        let command = upload_command("~/key.pem", 0o400);

        run_in_home(home.path(), &command, b"first\n");
        run_in_home(home.path(), &command, b"second\n");

        assert_eq!(
            fs::read_to_string(home.path().join("key.pem")).unwrap(),
            "second\n"
        );
    }

    #[test]
    fn upload_creates_missing_directories() {
        let home = tempfile::tempdir().unwrap();

        run_in_home(home.path(), &upload_command("~/bin/tunnel.sh", 0o700), b"#!/bin/bash\n");

        let path = home.path().join("bin/tunnel.sh");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn append_keeps_existing_entry() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir(home.path().join(".ssh")).unwrap();
        let path = home.path().join(".ssh/authorized_keys");
        let original = "ssh-rsa AAAAB3Nza existing@host\n";
        fs::write(&path, original).unwrap();

        run_in_home(
            home.path(),
            &append_command("~/.ssh/authorized_keys"),
            line_payload("ssh-ed25519 AAAAC3Nz tunnel-maker").as_bytes(),
        );

        let content = fs::read_to_string(&path).unwrap();
        let entries: Vec<&str> = content.lines().collect();
        assert_eq!(entries.len(), 2);
        assert!(content.starts_with(original));
        assert_eq!(entries[1], "ssh-ed25519 AAAAC3Nz tunnel-maker");
    }

    #[test]
    fn append_separates_entry_without_trailing_newline() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir(home.path().join(".ssh")).unwrap();
        let path = home.path().join(".ssh/authorized_keys");
        fs::write(&path, "ssh-rsa AAAAB3Nza existing@host").unwrap();

        run_in_home(
            home.path(),
            &append_command("~/.ssh/authorized_keys"),
            line_payload("ssh-ed25519 AAAAC3Nz tunnel-maker").as_bytes(),
        );

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "ssh-rsa AAAAB3Nza existing@host\nssh-ed25519 AAAAC3Nz tunnel-maker\n"
        );
    }

    #[test]
    fn append_creates_ssh_directory() {
        let home = tempfile::tempdir().unwrap();

        run_in_home(
            home.path(),
            &append_command("~/.ssh/authorized_keys"),
            line_payload("ssh-ed25519 AAAAC3Nz tunnel-maker").as_bytes(),
        );

        let dir = home.path().join(".ssh");
        assert_eq!(fs::metadata(&dir).unwrap().permissions().mode() & 0o777, 0o700);
        assert_eq!(
            fs::read_to_string(dir.join("authorized_keys")).unwrap(),
            "ssh-ed25519 AAAAC3Nz tunnel-maker\n"
        );
    }

    #[test]
    fn payload_is_single_line() {
        assert_eq!(line_payload("ssh-ed25519 AAAA x\r\n"), "ssh-ed25519 AAAA x\n");
        assert_eq!(line_payload("ssh-ed25519 AAAA x"), "ssh-ed25519 AAAA x\n");
    }
}
