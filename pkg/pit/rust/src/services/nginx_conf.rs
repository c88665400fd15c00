// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! nginx configuration rendering for the global and per-project proxies.

use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::layout::{NginxInstall, ProjectPaths};

/// Top-level domain of the global vhosts.
pub const SITE_TLD: &str = "test";

/// A site served by the global proxy, one per subdirectory of `www/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    pub root: PathBuf,
}

impl Site {
    pub fn domain(&self) -> String {
        format!("{}.{SITE_TLD}", self.name)
    }
}

/// Immediate subdirectories of `www`, sorted by name. A `public/` subfolder,
/// when present, becomes the document root. A missing `www` yields no sites.
pub fn discover_sites(www: &Path) -> std::io::Result<Vec<Site>> {
    let entries = match fs::read_dir(www) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut sites: Vec<Site> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let mut root = entry.path();
            if root.join("public").is_dir() {
                root.push("public");
            }
            Some(Site { name, root })
        })
        .collect();
    sites.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sites)
}

fn http_preamble(nginx: &NginxInstall, logs: &Path) -> String {
    format!(
        "worker_processes  1;

events {{
    worker_connections  1024;
}}

http {{
    include       {mime};
    default_type  application/octet-stream;

    access_log  {logs}/access.log;
    error_log   {logs}/error.log;
",
        mime = nginx.mime_types().display(),
        logs = logs.display(),
    )
}

/// Render the global proxy config: one vhost per site proxying PHP to
/// `127.0.0.1:<php_port>`, the first site being the default server.
pub fn render_global(
    nginx: &NginxInstall,
    sites: &[Site],
    listen_port: u16,
    php_port: u16,
) -> String {
    let mut conf = http_preamble(nginx, &nginx.logs());
    let _ = write!(
        conf,
        "
    # pit tools
    include {};
",
        nginx.tools_include().display()
    );

    if sites.is_empty() {
        let _ = write!(
            conf,
            "
    server {{
        listen {listen_port} default_server;
        server_name localhost;
        root {root};
        index index.php index.html;

        location / {{
            try_files $uri $uri/ =404;
        }}
    }}
",
            root = nginx.fallback_root().display(),
        );
    }

    for (i, site) in sites.iter().enumerate() {
        let default = if i == 0 { " default_server" } else { "" };
        let _ = write!(
            conf,
            "
    server {{
        listen {listen_port}{default};
        server_name {domain};

        root {root};
        index index.php index.html;

        location / {{
            try_files $uri $uri/ /index.php?$query_string;
        }}

        location ~ \\.php$ {{
            include {fastcgi};
            fastcgi_pass 127.0.0.1:{php_port};
            fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
        }}
    }}
",
            domain = site.domain(),
            root = site.root.display(),
            fastcgi = nginx.fastcgi_conf().display(),
        );
    }

    conf.push_str("}\n");
    conf
}

/// Render a project proxy config: a single vhost on `port` forwarding PHP
/// over the project's unix socket.
pub fn render_project(
    nginx: &NginxInstall,
    runtime: &ProjectPaths,
    project: &str,
    port: u16,
    doc_root: &Path,
) -> String {
    let mut conf = http_preamble(nginx, &runtime.nginx_logs());
    let _ = write!(
        conf,
        "
    server {{
        listen {port};
        server_name {project}.local;

        root {root};
        index index.php index.html;

        location / {{
            try_files $uri $uri/ /index.php?$query_string;
        }}

        location ~ \\.php$ {{
            fastcgi_pass unix:{socket};
            include {fastcgi};
            fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
        }}
    }}
}}
",
        root = doc_root.display(),
        socket = runtime.php_socket().display(),
        fastcgi = nginx.fastcgi_conf().display(),
    );
    conf
}
