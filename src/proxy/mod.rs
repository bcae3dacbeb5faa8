// ABOUTME: Reverse-proxy configuration text generation.
// ABOUTME: Pure ProxySpec to nginx server-block rendering, no side effects.

use crate::artifact::{ProxyLocation, ProxySpec, TlsMaterial};

pub const CONFIG_FILENAME: &str = "nginx.conf";

/// Render the nginx configuration for a proxy spec.
///
/// Plain specs yield one server block on port 80. HTTPS specs yield two:
/// the TLS block on 443 plus a port-80 block that 301-redirects.
pub fn render(spec: &ProxySpec) -> String {
    if spec.https && let Some(tls) = &spec.tls {
        https_config(spec, tls)
    } else {
        default_config(spec)
    }
}

fn default_config(spec: &ProxySpec) -> String {
    let mut out = String::new();
    out.push_str("server {\n");
    out.push_str(&listen_http());
    out.push_str(&server_name(spec));
    out.push_str(&common_body(spec));
    out.push_str("}\n");
    out
}

fn https_config(spec: &ProxySpec, tls: &TlsMaterial) -> String {
    let mut out = String::new();
    out.push_str("server {\n");
    out.push_str(&listen_https(tls));
    out.push_str(&server_name(spec));
    out.push_str(&common_body(spec));
    out.push_str("}\n");

    // Port 80 companion block: everything moves to https permanently.
    out.push_str("server {\n");
    out.push_str(&listen_http());
    out.push_str(&server_name(spec));
    out.push_str("    return       301 https://$server_name$request_uri;\n");
    out.push_str("}\n");
    out
}

/// The composition shared by the plain block and the TLS block: index,
/// SPA fallback, body-size limit, then one block per non-empty location.
fn common_body(spec: &ProxySpec) -> String {
    let mut out = String::new();
    out.push_str("    index index.html index.htm index.nginx-debian.html;\n");
    out.push_str(&default_location());
    out.push_str(&format!(
        "    client_max_body_size {}M;\n",
        spec.max_body_size_mb
    ));
    for location in &spec.locations {
        if !location.is_empty() {
            out.push_str(&proxy_location(location));
        }
    }
    out
}

fn listen_http() -> String {
    "    listen 80;\n    listen [::]:80;\n".to_string()
}

fn listen_https(tls: &TlsMaterial) -> String {
    format!(
        "    listen 443 ssl;\n    listen [::]:443 ssl;\n\n    ssl_certificate {};\n    ssl_certificate_key {};\n",
        tls.certificate, tls.certificate_key
    )
}

/// `server_name` line: domains joined by single spaces, terminated by a
/// semicolon with no dangling separator.
fn server_name(spec: &ProxySpec) -> String {
    let domains: Vec<&str> = spec.domains.iter().map(String::as_str).collect();
    format!("    server_name {};\n", domains.join(" "))
}

fn default_location() -> String {
    concat!(
        "    location / {\n",
        "        error_page 405 =200 $uri;\n",
        "        root /usr/share/nginx/html;\n",
        "        try_files $uri $uri/ /index.html;\n",
        "    }\n",
    )
    .to_string()
}

fn proxy_location(location: &ProxyLocation) -> String {
    format!(
        concat!(
            "    location {path} {{\n",
            "        proxy_pass {upstream};\n",
            "        proxy_http_version 1.1;\n",
            "        proxy_set_header Connection \"\";\n",
            "\n",
            "        proxy_set_header Host $host;\n",
            "        proxy_set_header X-Real-IP $remote_addr;\n",
            "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n",
            "        proxy_set_header X-Forwarded-Proto $scheme;\n",
            "        proxy_set_header X-Forwarded-Host $host;\n",
            "        proxy_set_header X-Forwarded-Port $server_port;\n",
            "\n",
            "        proxy_read_timeout 300;\n",
            "    }}\n",
        ),
        path = location.path,
        upstream = location.upstream,
    )
}
