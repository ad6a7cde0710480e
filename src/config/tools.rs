use log::info;
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

fn default_region() -> String {
    "ru-ru".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_lang() -> String {
    "ru".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuckDuckGoConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WikipediaConfig {
    #[serde(default = "default_lang")]
    pub lang: String,
}

/// External tools the chat agent may call. A section that is absent
/// disables its tool.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub duckduckgo: Option<DuckDuckGoConfig>,
    pub wikipedia: Option<WikipediaConfig>,
}

impl ToolsConfig {
    pub fn is_empty(&self) -> bool {
        self.duckduckgo.is_none() && self.wikipedia.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(ddg) = &self.duckduckgo {
            if ddg.max_results == 0 {
                return Err("duckduckgo.max_results must be greater than 0".into());
            }
        }
        if let Some(wiki) = &self.wikipedia {
            if wiki.lang.trim().is_empty() || !wiki.lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(format!("wikipedia.lang '{}' is not a valid language code", wiki.lang));
            }
        }
        Ok(())
    }
}

pub fn load_tools_config(path: &str) -> Result<ToolsConfig, Box<dyn Error + Send + Sync>> {
    if !Path::new(path).exists() {
        info!("Tools config '{}' not found, agent tools beyond the index are disabled", path);
        return Ok(ToolsConfig::default());
    }
    let text = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read tools config '{}': {}", path, e))?;
    if text.trim().is_empty() {
        return Ok(ToolsConfig::default());
    }
    let config: ToolsConfig = serde_yaml
        ::from_str(&text)
        .map_err(|e| format!("Failed to parse tools config '{}': {}", path, e))?;
    config.validate().map_err(|e| format!("Invalid tools config '{}': {}", path, e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn sections_with_defaults() {
        let file = write_temp("duckduckgo: {}\nwikipedia:\n  lang: en\n");
        let config = load_tools_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            config.duckduckgo,
            Some(DuckDuckGoConfig { region: "ru-ru".into(), max_results: 10 })
        );
        assert_eq!(config.wikipedia, Some(WikipediaConfig { lang: "en".into() }));
    }

    #[test]
    fn missing_or_empty_file_means_no_tools() {
        assert!(load_tools_config("/no/such/tools.yaml").unwrap().is_empty());
        let file = write_temp("   \n");
        assert!(load_tools_config(file.path().to_str().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let file = write_temp("bing:\n  key: abc\n");
        assert!(load_tools_config(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = write_temp("duckduckgo:\n  max_results: 0\n");
        assert!(load_tools_config(file.path().to_str().unwrap()).is_err());
        let file = write_temp("wikipedia:\n  lang: \"e n\"\n");
        assert!(load_tools_config(file.path().to_str().unwrap()).is_err());
    }
}
