//! The `http` profile.
//!
//! Every operation that needs the listener layout reads the same config file
//! the server binary loads, so answers reflect what is actually deployed.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde_json::Value;

use crate::config::{load_config, save_config, Config};
use crate::profile::messages::{
    HostFileMessage, Ioc, IocResponse, ParameterMessage, ProfileDefinition, ProfileResponse,
};
use crate::profile::parameters::{http_parameters, ProfileParameter, DEFAULT_CALLBACK_HOST};
use crate::profile::C2Profile;

/// Ports that do not stand out for an `https` callback.
pub const STANDARD_HTTPS_PORTS: [i64; 3] = [443, 8443, 7443];

/// Encoded sample agent message (a UUID followed by an encrypted blob).
const SAMPLE_MESSAGE: &str = "MjQ1M2Q2NjQtYmZhNC00ZTI5LTgzMjEtNTgxYzQwNDBjYWM5Iv_gaPq1yVK76sNsMwCgtIOOQPWJ_fO0YBZGtyvdGIcDXnaTmlG6GLJ-ZV9NdhfNKxlM4u7JOHQeB4zJmQiNf1mqokqvhh1Vm9dYRc8O87J8oIv-H1sIENR-NDW1mirT";

const REWRITE_ATTRIBUTION: &str = "#mod_rewrite rules generated from @AndrewChiles' project https://github.com/threatexpress/mythic2modrewrite:\n";

/// HTTP profile backed by a listener config file.
#[derive(Debug, Clone)]
pub struct HttpProfile {
    config_path: PathBuf,
}

impl HttpProfile {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn current_config(&self) -> Result<Config, String> {
        load_config(&self.config_path).map_err(|e| {
            tracing::error!(path = %self.config_path.display(), error = %e, "Failed to read profile config");
            e.to_string()
        })
    }
}

/// Format ports the way operators see them in Mythic, e.g. `[80 8080]`.
fn port_list(ports: &[u16]) -> String {
    let joined: Vec<String> = ports.iter().map(u16::to_string).collect();
    format!("[{}]", joined.join(" "))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn redirector_advice(host: &str, port: i64, ssl_ports: &[u16], plain_ports: &[u16]) -> String {
    let https = host.starts_with("https");
    let mut message = String::from(
        "Specified use of SSL and ports indicate the use of a redirector, or a mismatch in expected connectivity.\n\n",
    );
    message.push_str("This means there should be the following connectivity for success:\n");
    let scheme = if https { "HTTPS" } else { "HTTP" };
    message.push_str(&format!(
        "Agent via {scheme} on port {port} to {host} (should be a redirector).\n"
    ));

    if !ssl_ports.is_empty() {
        message.push_str(&format!(
            "Redirector then forwards request to C2 Profile container WITH SSL on one of the following ports: {}\n",
            port_list(ssl_ports)
        ));
    }
    if !plain_ports.is_empty() {
        let lead = if ssl_ports.is_empty() {
            "Redirector then forwards"
        } else {
            "Alternatively, redirector could forward"
        };
        message.push_str(&format!(
            "{lead} request to C2 Profile container WITHOUT SSL on one of the following ports: {}\n",
            port_list(plain_ports)
        ));
    }

    if https {
        message.push_str("\nAlternatively, this might mean that you want to do SSL but are not using SSL within your C2 Profile container.\n");
        message.push_str("To add SSL to your C2 profile:\n");
        message.push_str("\t1. Go to the C2 Profile page\n");
        message.push_str("\t2. Click configure for the http profile\n");
        message.push_str(&format!(
            "\t3. Change 'use_ssl' to 'true' and make sure the port is {port}\n"
        ));
        message.push_str("\t4. Click to stop the profile and then start it again\n");
    }
    message
}

impl C2Profile for HttpProfile {
    fn definition(&self) -> ProfileDefinition {
        ProfileDefinition {
            name: "http".into(),
            author: "@its_a_feature_".into(),
            description: "Uses HTTP Get/Post messages for connectivity".into(),
            is_p2p: false,
            is_server_routed: true,
        }
    }

    fn parameters(&self) -> Vec<ProfileParameter> {
        http_parameters()
    }

    fn config_check(&self, message: &ParameterMessage) -> ProfileResponse {
        let Some(port) = message.number_arg("callback_port") else {
            return ProfileResponse::failed("Failed to get callback_port attribute");
        };
        let Some(host) = message.string_arg("callback_host") else {
            return ProfileResponse::failed("Failed to get callback_host attribute");
        };
        let config = match self.current_config() {
            Ok(config) => config,
            Err(e) => return ProfileResponse::failed(e),
        };

        let https = host.starts_with("https");
        let mut response = ProfileResponse::ok(String::new());
        let mut ssl_ports = Vec::new();
        let mut plain_ports = Vec::new();

        for instance in &config.instances {
            if instance.use_ssl {
                ssl_ports.push(instance.port);
            } else {
                plain_ports.push(instance.port);
            }
            if i64::from(instance.port) != port {
                continue;
            }

            // A mismatch is reported as a warning; the redirector advice still follows.
            if https && !instance.use_ssl {
                response.error = format!(
                    "C2 Profile container is configured to NOT use SSL on port {port}, but the callback host for the agent is using https, {host}.\n\n\
                     This means there should be the following connectivity for success:\n\
                     Agent via SSL to {host} on port {port}, then redirection to C2 Profile container WITHOUT SSL on port {port}"
                );
            } else if !https && instance.use_ssl {
                response.error = format!(
                    "C2 Profile container is configured to use SSL on port {port}, but the callback host for the agent is using http, {host}.\n\n\
                     This means there should be the following connectivity for success:\n\
                     Agent via NO SSL to {host} on port {port}, then redirection to C2 Profile container WITH SSL on port {port}"
                );
            } else {
                response.message = format!(
                    "C2 Profile container and agent configuration match port, {port}, and SSL expectations ({})\n",
                    instance.use_ssl
                );
                return response;
            }
        }

        response.message = redirector_advice(host, port, &ssl_ports, &plain_ports);
        response
    }

    fn redirector_rules(&self, message: &ParameterMessage) -> ProfileResponse {
        let mut warnings = String::new();
        let mut user_agent = "";
        let mut uris = Vec::new();

        match message.dictionary_arg("headers") {
            None => warnings.push_str("#[!] Headers c2 profile parameter not found\n"),
            Some(headers) => match headers.get("User-Agent").and_then(Value::as_str) {
                Some(ua) => user_agent = ua,
                None => warnings.push_str("#[!] User-Agent not found in headers\n"),
            },
        }
        match message.string_arg("get_uri") {
            Some(uri) => uris.push(format!("/{uri}")),
            None => warnings.push_str("#[!] No GET URI found\n"),
        }
        match message.string_arg("post_uri") {
            Some(uri) => uris.push(format!("/{uri}")),
            None => warnings.push_str("#[!] No POST URI found\n"),
        }

        let config = match self.current_config() {
            Ok(config) => config,
            Err(_) => return ProfileResponse::failed("Failed to get current json configuration"),
        };

        // mod_rewrite treats parentheses in the UA condition as grouping.
        let user_agent = user_agent.replace('(', "\\(").replace(')', "\\)");
        let uri_pattern = format!("{}.*", uris.join(".*|"));
        let rewrites: Vec<String> = config
            .instances
            .iter()
            .map(|instance| {
                let scheme = if instance.use_ssl { "https" } else { "http" };
                format!(
                    "RewriteRule ^.*$ \"{scheme}://C2_SERVER_HERE:{}%{{REQUEST_URI}}\" [P,L]",
                    instance.port
                )
            })
            .collect();

        let htaccess = format!(
            "\n########################################\n\
             ## .htaccess START\n\
             RewriteEngine On\n\
             ## C2 Traffic (HTTP-GET, HTTP-POST, HTTP-STAGER URIs)\n\
             ## Logic: If a requested URI AND the User-Agent matches, proxy the connection to the Teamserver\n\
             ## Consider adding other HTTP checks to fine tune the check.  (HTTP Cookie, HTTP Referer, HTTP Query String, etc)\n\
             ## Refer to http://httpd.apache.org/docs/current/mod/mod_rewrite.html\n\
             ## Only allow GET and POST methods to pass to the C2 server\n\
             RewriteCond %{{REQUEST_METHOD}} ^(GET|POST) [NC]\n\
             ## Profile URIs\n\
             RewriteCond %{{REQUEST_URI}} ^({uri_pattern})$\n\
             ## Profile UserAgent\n\
             RewriteCond %{{HTTP_USER_AGENT}} \"{user_agent}\"\n\
             {}\n\
             ## Redirect all other traffic here\n\
             RewriteRule ^.*$ redirect/? [L,R=302]\n\
             ## .htaccess END\n\
             ########################################\n",
            rewrites.join("\n")
        );

        let mut output = String::from(REWRITE_ATTRIBUTION);
        output.push_str(&warnings);
        output.push_str("#\tReplace 'C2_SERVER_HERE' with the IP/Domain address of where matching traffic should go\n");
        output.push_str("#\tReplace 'redirect' with the http(s) address of where non-matching traffic should go, ex: https://redirect.com\n");
        output.push('\n');
        output.push_str(&htaccess);
        ProfileResponse::ok(output)
    }

    fn opsec_check(&self, message: &ParameterMessage) -> ProfileResponse {
        let Some(host) = message.string_arg("callback_host") else {
            return ProfileResponse::failed("Failed to get callback_host attribute");
        };
        let Some(port) = message.number_arg("callback_port") else {
            return ProfileResponse::failed("Failed to get callback_port attribute");
        };

        if host == DEFAULT_CALLBACK_HOST {
            return ProfileResponse::failed(format!(
                "Callback Host is set to default of {DEFAULT_CALLBACK_HOST}!\n"
            ));
        }
        if host.split(':').count() != 2 {
            return ProfileResponse::failed(format!(
                "callback host is improperly configured! {host} shouldn't specify a port, that should be in the callback_port field"
            ));
        }
        if host.starts_with("https") && !STANDARD_HTTPS_PORTS.contains(&port) {
            return ProfileResponse::ok(format!("Callback port, {port}, is unusual for https scheme"));
        }
        ProfileResponse::ok("No immediate issues with configuration")
    }

    fn get_ioc(&self, message: &ParameterMessage) -> IocResponse {
        let Some(host) = message.string_arg("callback_host") else {
            return IocResponse::failed("Failed to get callback_host");
        };
        let Some(port) = message.number_arg("callback_port") else {
            return IocResponse::failed("Failed to get callback_port");
        };
        let Some(get_uri) = message.string_arg("get_uri") else {
            return IocResponse::failed("Failed to get get_uri");
        };
        let Some(post_uri) = message.string_arg("post_uri") else {
            return IocResponse::failed("Failed to get post_uri");
        };
        let Some(query) = message.string_arg("query_path_name") else {
            return IocResponse::failed("Failed to get query_path_name");
        };

        IocResponse {
            success: true,
            error: String::new(),
            iocs: vec![
                Ioc::url(format!("{host}:{port}")),
                Ioc::url(format!("{host}:{port}/{get_uri}?{query}=")),
                Ioc::url(format!("{host}:{port}/{post_uri}")),
            ],
        }
    }

    fn sample_message(&self, message: &ParameterMessage) -> ProfileResponse {
        let Some(get_uri) = message.string_arg("get_uri") else {
            return ProfileResponse::failed("Failed to get get_uri");
        };
        let Some(post_uri) = message.string_arg("post_uri") else {
            return ProfileResponse::failed("Failed to get post_uri");
        };
        let Some(query) = message.string_arg("query_path_name") else {
            return ProfileResponse::failed("Failed to get query_path_name");
        };
        let Some(headers) = message.dictionary_arg("headers") else {
            return ProfileResponse::failed("Failed to get headers");
        };
        let Some(host) = message.string_arg("callback_host") else {
            return ProfileResponse::failed("Failed to get callback host");
        };
        let Some(port) = message.number_arg("callback_port") else {
            return ProfileResponse::failed("Failed to get callback port");
        };

        let raw = match URL_SAFE.decode(SAMPLE_MESSAGE) {
            Ok(raw) => raw,
            Err(e) => return ProfileResponse::failed(format!("Failed to decode sample message: {e}")),
        };
        let url_safe = URL_SAFE.encode(&raw);
        let standard = STANDARD.encode(&raw);

        let header_flags: String = headers
            .iter()
            .map(|(name, value)| format!("-H \"{name}: {}\" ", value_text(value)))
            .collect();

        let get = format!("curl {header_flags}{host}:{port}/{get_uri}?{query}={url_safe}");
        let post = format!("curl -X POST -d \"{standard}\" {header_flags}{host}:{port}/{post_uri}");
        ProfileResponse::ok(format!("GET:\n{get}\n\nPOST:\n{post}\n\n"))
    }

    fn host_file(&self, message: &HostFileMessage) -> ProfileResponse {
        let mut config = match self.current_config() {
            Ok(config) => config,
            Err(e) => return ProfileResponse::failed(e),
        };

        for instance in &mut config.instances {
            instance
                .payload_host_paths
                .insert(message.host_url.clone(), message.file_uuid.clone());
        }

        match save_config(&self.config_path, &config) {
            Ok(()) => {
                tracing::info!(
                    host_url = %message.host_url,
                    file_uuid = %message.file_uuid,
                    instances = config.instances.len(),
                    "Hosting file on every instance"
                );
                ProfileResponse::ok(String::new())
            }
            Err(e) => ProfileResponse::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn instance(port: u16, use_ssl: bool) -> InstanceConfig {
        let mut config = InstanceConfig::plain(port);
        config.use_ssl = use_ssl;
        config
    }

    fn profile_with(instances: Vec<InstanceConfig>) -> (TempDir, HttpProfile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        save_config(&path, &Config { instances }).unwrap();
        (dir, HttpProfile::new(path))
    }

    fn params(value: Value) -> ParameterMessage {
        let Value::Object(map) = value else { panic!("parameters must be an object") };
        ParameterMessage::new(map)
    }

    fn agent_params() -> ParameterMessage {
        params(json!({
            "callback_host": "https://c2.example.com",
            "callback_port": 443,
            "get_uri": "index",
            "post_uri": "data",
            "query_path_name": "q",
            "headers": {"User-Agent": "Mozilla/5.0 (Windows NT 6.3)"}
        }))
    }

    #[test]
    fn config_check_accepts_matching_port_and_ssl() {
        let (_dir, profile) = profile_with(vec![instance(80, false), instance(443, true)]);
        let response = profile.config_check(&agent_params());

        assert!(response.success);
        assert!(response.error.is_empty());
        assert!(response.message.contains("match port, 443, and SSL expectations (true)"));
    }

    #[test]
    fn config_check_warns_on_ssl_mismatch() {
        let (_dir, profile) = profile_with(vec![instance(443, false)]);
        let response = profile.config_check(&agent_params());

        assert!(response.success);
        assert!(response.error.contains("configured to NOT use SSL on port 443"));
        assert!(response.message.contains("should be a redirector"));
    }

    #[test]
    fn config_check_describes_redirector_path() {
        let (_dir, profile) = profile_with(vec![instance(80, false), instance(8080, false), instance(8443, true)]);
        let response = profile.config_check(&agent_params());

        assert!(response.success);
        assert!(response.message.contains("Agent via HTTPS on port 443"));
        assert!(response.message.contains("WITH SSL on one of the following ports: [8443]"));
        assert!(response
            .message
            .contains("Alternatively, redirector could forward request to C2 Profile container WITHOUT SSL on one of the following ports: [80 8080]"));
        assert!(response.message.contains("Change 'use_ssl' to 'true' and make sure the port is 443"));
    }

    #[test]
    fn config_check_requires_callback_fields() {
        let (_dir, profile) = profile_with(vec![instance(80, false)]);
        let response = profile.config_check(&params(json!({"callback_host": "http://a"})));
        assert!(!response.success);
        assert_eq!(response.error, "Failed to get callback_port attribute");
    }

    #[test]
    fn config_check_reports_unreadable_config() {
        let profile = HttpProfile::new("/nonexistent/mythic/config.json");
        let response = profile.config_check(&agent_params());
        assert!(!response.success);
        assert!(!response.error.is_empty());
    }

    #[test]
    fn redirector_rules_cover_every_instance() {
        let (_dir, profile) = profile_with(vec![instance(80, false), instance(443, true)]);
        let response = profile.redirector_rules(&agent_params());

        assert!(response.success);
        let rules = &response.message;
        assert!(rules.starts_with(REWRITE_ATTRIBUTION));
        assert!(rules.contains("RewriteCond %{REQUEST_URI} ^(/index.*|/data.*)$"));
        assert!(rules.contains("RewriteCond %{HTTP_USER_AGENT} \"Mozilla/5.0 \\(Windows NT 6.3\\)\""));
        assert!(rules.contains("RewriteRule ^.*$ \"http://C2_SERVER_HERE:80%{REQUEST_URI}\" [P,L]"));
        assert!(rules.contains("RewriteRule ^.*$ \"https://C2_SERVER_HERE:443%{REQUEST_URI}\" [P,L]"));
        assert!(!rules.contains("#[!]"));
    }

    #[test]
    fn redirector_rules_flag_missing_parameters() {
        let (_dir, profile) = profile_with(vec![instance(80, false)]);
        let response = profile.redirector_rules(&params(json!({"get_uri": "index"})));

        assert!(response.success);
        assert!(response.message.contains("#[!] Headers c2 profile parameter not found"));
        assert!(response.message.contains("#[!] No POST URI found"));
        assert!(response.message.contains("^(/index.*)$"));
    }

    #[test]
    fn opsec_check_rejects_default_host() {
        let profile = HttpProfile::new("unused.json");
        let response = profile.opsec_check(&params(json!({
            "callback_host": DEFAULT_CALLBACK_HOST,
            "callback_port": 443
        })));
        assert!(!response.success);
        assert!(response.error.contains("default of https://domain.com"));
    }

    #[test]
    fn opsec_check_rejects_port_in_host() {
        let profile = HttpProfile::new("unused.json");
        let response = profile.opsec_check(&params(json!({
            "callback_host": "https://c2.example.com:8443",
            "callback_port": 8443
        })));
        assert!(!response.success);
        assert!(response.error.contains("shouldn't specify a port"));
    }

    #[test]
    fn opsec_check_notes_unusual_https_port() {
        let profile = HttpProfile::new("unused.json");

        let unusual = profile.opsec_check(&params(json!({
            "callback_host": "https://c2.example.com",
            "callback_port": 9999
        })));
        assert!(unusual.success);
        assert_eq!(unusual.message, "Callback port, 9999, is unusual for https scheme");

        for port in STANDARD_HTTPS_PORTS {
            let standard = profile.opsec_check(&params(json!({
                "callback_host": "https://c2.example.com",
                "callback_port": port
            })));
            assert_eq!(standard.message, "No immediate issues with configuration");
        }
    }

    #[test]
    fn iocs_list_base_get_and_post_urls() {
        let profile = HttpProfile::new("unused.json");
        let response = profile.get_ioc(&agent_params());

        assert!(response.success);
        let values: Vec<_> = response.iocs.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(
            values,
            vec![
                "https://c2.example.com:443",
                "https://c2.example.com:443/index?q=",
                "https://c2.example.com:443/data",
            ]
        );
        assert!(response.iocs.iter().all(|i| i.kind == "url"));
    }

    #[test]
    fn iocs_require_query_name() {
        let profile = HttpProfile::new("unused.json");
        let mut message = agent_params();
        message.parameters.remove("query_path_name");
        let response = profile.get_ioc(&message);
        assert!(!response.success);
        assert_eq!(response.error, "Failed to get query_path_name");
    }

    #[test]
    fn sample_message_builds_curl_commands() {
        let profile = HttpProfile::new("unused.json");
        let response = profile.sample_message(&agent_params());
        assert!(response.success);

        let raw = URL_SAFE.decode(SAMPLE_MESSAGE).unwrap();
        assert_eq!(raw.len(), 132);
        let message = &response.message;
        assert!(message.starts_with("GET:\ncurl -H \"User-Agent: Mozilla/5.0 (Windows NT 6.3)\" "));
        assert!(message.contains(&format!("https://c2.example.com:443/index?q={SAMPLE_MESSAGE}")));
        assert!(message.contains(&format!("POST:\ncurl -X POST -d \"{}\" ", STANDARD.encode(&raw))));
        assert!(message.contains("https://c2.example.com:443/data\n\n"));
    }

    #[test]
    fn host_file_adds_payload_to_every_instance() {
        let (_dir, profile) = profile_with(vec![instance(80, false), instance(443, true)]);
        let response = profile.host_file(&HostFileMessage {
            file_uuid: "abc-123".into(),
            host_url: "/update.exe".into(),
        });
        assert!(response.success, "{}", response.error);

        let saved = load_config(profile.config_path()).unwrap();
        for instance in &saved.instances {
            assert_eq!(instance.payload_host_paths.get("/update.exe").map(String::as_str), Some("abc-123"));
        }
    }

    #[test]
    fn host_file_fails_without_config() {
        let profile = HttpProfile::new("/nonexistent/mythic/config.json");
        let response = profile.host_file(&HostFileMessage {
            file_uuid: "abc-123".into(),
            host_url: "/update.exe".into(),
        });
        assert!(!response.success);
    }
}
