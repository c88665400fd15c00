// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Parsing of the `/proc/net/tcp` and `/proc/net/tcp6` socket tables.

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

pub type Ino = u64;
pub type Port = u16;

const TCP_LISTEN: u8 = 0x0A;

/// Inodes of every TCP socket in LISTEN state bound to `port`, any address.
pub fn listening_inodes(proc_root: &Path, port: Port) -> HashSet<Ino> {
    let mut result = HashSet::new();
    for table in ["tcp", "tcp6"] {
        parse_socket_table(&proc_root.join("net").join(table), port, &mut result);
    }
    result
}

fn parse_socket_table(path: &Path, port: Port, result: &mut HashSet<Ino>) {
    const READ_LIMIT: u64 = 64 * 1024 * 1024;

    let Ok(table) = fs::File::open(path) else {
        return;
    };
    let mut table = BufReader::new(table.take(READ_LIMIT));
    let mut line_buf = String::with_capacity(256);

    // Header line
    if table.read_line(&mut line_buf).is_err() {
        return;
    }

    loop {
        line_buf.clear();
        match table.read_line(&mut line_buf) {
            Ok(0) => break,
            Ok(_) => {
                if let Some((inode, local_port)) = parse_listen_line(&line_buf)
                    && local_port == port
                {
                    result.insert(inode);
                }
            }
            Err(_) => break,
        }
    }
}

fn get_fields(line: &str) -> Option<(&str, &str, &str)> {
    let mut iter = line.split_whitespace();
    let local_address = iter.nth(1)?; // field 1: local address
    let state = iter.nth(1)?; // field 3: state
    let inode = iter.nth(5)?; // field 9: inode
    Some((local_address, state, inode))
}

/// Returns the inode and local port of a LISTEN socket line, `None` for any
/// other state or a malformed line.
fn parse_listen_line(line: &str) -> Option<(Ino, Port)> {
    let (local_address, state, inode) = get_fields(line)?;

    if u8::from_str_radix(state, 16).ok()? != TCP_LISTEN {
        return None;
    }

    // "ADDR:PORT", both hex
    let (_, port) = local_address.rsplit_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let inode = inode.parse().ok()?;

    Some((inode, port))
}
