// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Read-only view of the process table, used to find processes that escaped
//! PID-file tracking.

pub mod fd;
pub mod net;

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::trace;

static PROC_ROOT: OnceLock<PathBuf> = OnceLock::new();

pub fn root_path() -> &'static Path {
    PROC_ROOT.get_or_init(|| {
        if let Ok(v) = env::var("HOST_PROC") {
            return v.into();
        }
        "/proc".into()
    })
}

/// A proc filesystem mounted at `root`.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn host() -> Self {
        Self::new(root_path())
    }

    /// All numeric entries of the proc root.
    pub fn pids(&self) -> Vec<i32> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut pids: Vec<i32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        pids
    }

    pub fn cmdline(&self, pid: i32) -> std::io::Result<Cmdline> {
        let path = self.root.join(pid.to_string()).join("cmdline");
        Ok(Cmdline::new(fs::read_to_string(path)?))
    }

    /// Fields of `/proc/<pid>/stat` following the command name, starting
    /// with the state.
    fn stat_fields(&self, pid: i32) -> Option<Vec<String>> {
        let path = self.root.join(pid.to_string()).join("stat");
        let stat = fs::read_to_string(path).ok()?;
        // The command name may itself contain ')' so anchor on the last one.
        let (_, rest) = stat.rsplit_once(')')?;
        Some(rest.split_whitespace().map(str::to_string).collect())
    }

    /// True when `/proc/<pid>/stat` reports the zombie state.
    pub fn is_zombie(&self, pid: i32) -> bool {
        self.stat_fields(pid)
            .is_some_and(|fields| fields.first().is_some_and(|state| state == "Z"))
    }

    pub fn parent(&self, pid: i32) -> Option<i32> {
        self.stat_fields(pid)?.get(1)?.parse().ok()
    }

    /// PIDs owning a TCP socket listening on `port`.
    pub fn listeners(&self, port: u16) -> Vec<i32> {
        let inodes = net::listening_inodes(&self.root, port);
        if inodes.is_empty() {
            return Vec::new();
        }
        trace!("port {port} is held by socket inodes {inodes:?}");

        self.pids()
            .into_iter()
            .filter(|&pid| owns_any(&self.root, pid, &inodes))
            .collect()
    }

    /// PIDs whose command line satisfies every needle.
    pub fn matching(&self, needles: &[Needle<'_>]) -> Vec<i32> {
        self.pids()
            .into_iter()
            .filter(|&pid| {
                self.cmdline(pid)
                    .is_ok_and(|cmdline| needles.iter().all(|&n| cmdline.matches(n)))
            })
            .collect()
    }
}

fn owns_any(root: &Path, pid: i32, inodes: &HashSet<net::Ino>) -> bool {
    fd::socket_inodes(root, pid)
        .map(|owned| owned.iter().any(|ino| inodes.contains(ino)))
        .unwrap_or(false)
}

/// One condition on a process command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Needle<'a> {
    /// Some argument contains the text.
    Contains(&'a str),
    /// Some argument has a whitespace-separated word equal to the text, so
    /// `pit_acme` does not match `pool pit_acme2`.
    Word(&'a str),
}

#[derive(Debug)]
pub struct Cmdline {
    cmdline: String,
}

impl Cmdline {
    pub fn new(mut cmdline: String) -> Self {
        let trim_len = cmdline.trim_end_matches('\0').len();
        cmdline.truncate(trim_len);
        Cmdline { cmdline }
    }

    pub fn args(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.cmdline.split_terminator('\0')
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.args().any(|arg| arg.contains(needle))
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.args()
            .any(|arg| arg.split_whitespace().any(|w| w == word))
    }

    pub fn matches(&self, needle: Needle<'_>) -> bool {
        match needle {
            Needle::Contains(text) => self.contains(text),
            Needle::Word(word) => self.has_word(word),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cmdline.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn fake_process(root: &Path, pid: i32, cmdline: &str, stat: &str) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("cmdline"), cmdline).unwrap();
        fs::write(dir.join("stat"), stat).unwrap();
    }

    #[test]
    fn test_cmdline_args() {
        let cmdline = Cmdline::new("nginx: master\0-p\0/opt/pit/runtime/acme/nginx\0\0".to_string());
        let args: Vec<&str> = cmdline.args().collect();
        assert_eq!(args, vec!["nginx: master", "-p", "/opt/pit/runtime/acme/nginx"]);
        assert!(cmdline.contains("runtime/acme"));
        assert!(!cmdline.contains("runtime/other"));

        assert!(Cmdline::new(String::new()).is_empty());
    }

    #[test]
    fn test_pids_skips_non_numeric_entries() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 42, "a", "42 (a) S");
        fake_process(root.path(), 7, "b", "7 (b) S");
        fs::create_dir_all(root.path().join("net")).unwrap();
        fs::write(root.path().join("uptime"), "1.0 1.0").unwrap();

        assert_eq!(ProcFs::new(root.path()).pids(), vec![7, 42]);
    }

    #[test]
    fn test_is_zombie() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 10, "", "10 (php-fpm) Z 1 10 10 0");
        fake_process(root.path(), 11, "", "11 (weird) name) S 1 11 11 0");
        let procfs = ProcFs::new(root.path());

        assert!(procfs.is_zombie(10));
        assert!(!procfs.is_zombie(11));
        assert!(!procfs.is_zombie(12));

        assert_eq!(procfs.parent(10), Some(1));
        assert_eq!(procfs.parent(12), None);
    }

    #[test]
    fn test_matching_requires_all_needles() {
        let root = tempfile::tempdir().unwrap();
        fake_process(
            root.path(),
            100,
            "php-fpm: pool pit_acme\0",
            "100 (php-fpm) S",
        );
        fake_process(
            root.path(),
            101,
            "php-fpm: pool pit_other\0",
            "101 (php-fpm) S",
        );
        fake_process(root.path(), 102, "vim\0pit_acme.conf\0", "102 (vim) S");
        fake_process(
            root.path(),
            103,
            "php-fpm: pool pit_acme2\0",
            "103 (php-fpm) S",
        );
        let procfs = ProcFs::new(root.path());

        let pool = [Needle::Contains("php-fpm"), Needle::Word("pit_acme")];
        assert_eq!(procfs.matching(&pool), vec![100]);
        assert_eq!(
            procfs.matching(&[Needle::Contains("php-fpm"), Needle::Contains("pit_acme")]),
            vec![100, 103]
        );
        assert!(procfs.matching(&[Needle::Contains("nginx")]).is_empty());
    }

    #[test]
    fn test_matching_anchors_runtime_prefix() {
        let root = tempfile::tempdir().unwrap();
        fake_process(
            root.path(),
            200,
            "nginx: master process /opt/pit/nginx/sbin/nginx -p /opt/pit/runtime/acme/nginx\0",
            "200 (nginx) S",
        );
        fake_process(
            root.path(),
            201,
            "nginx\0-p\0/opt/pit/runtime/acme2/nginx\0",
            "201 (nginx) S",
        );
        let procfs = ProcFs::new(root.path());

        let acme = [Needle::Contains("nginx"), Needle::Contains("/opt/pit/runtime/acme/")];
        assert_eq!(procfs.matching(&acme), vec![200]);
    }

    #[test]
    fn test_listeners_on_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let me = i32::try_from(std::process::id()).unwrap();
        assert!(ProcFs::new("/proc").listeners(port).contains(&me));
    }
}
