/// Normalize a server address into its control API base URL.
///
/// Ensures a trailing `/op-framework/` and an `https://` scheme. Addresses
/// that explicitly ask for `http://` keep it.
pub fn fix_api_url(server: &str) -> String {
    let mut url = server.trim().to_string();

    if !url.ends_with('/') {
        url.push('/');
    }
    if !url.ends_with("/op-framework/") {
        url.push_str("op-framework/");
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        url = format!("https://{}", url);
    }

    url
}

/// Split a comma-separated server list, dropping blanks.
pub fn parse_server_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(fix_api_url)
        .collect()
}
