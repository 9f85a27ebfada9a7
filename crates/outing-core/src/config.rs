use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::geocode::{
  DEFAULT_ENDPOINT,
  DEFAULT_SUFFIX
};
use crate::markers::LatLng;
use crate::selection::MapSettings;

const RC_ENV_VAR: &str = "OUTINGRC";
const RC_FILE_NAME: &str = ".outingrc";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "map.center".to_string(),
      "55.8642,-4.2518".to_string()
    );
    map.insert(
      "map.zoom".to_string(),
      "13".to_string()
    );
    map.insert(
      "map.focus_zoom".to_string(),
      "15".to_string()
    );
    map.insert(
      "geocode.endpoint".to_string(),
      DEFAULT_ENDPOINT.to_string()
    );
    map.insert(
      "geocode.suffix".to_string(),
      DEFAULT_SUFFIX.to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading outingrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no outingrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn events_file(
    &self
  ) -> Option<PathBuf> {
    self
      .get("events.file")
      .filter(|v| !v.trim().is_empty())
      .map(|v| expand_tilde(Path::new(&v)))
  }

  pub fn geocode_endpoint(
    &self
  ) -> String {
    self
      .get("geocode.endpoint")
      .unwrap_or_else(|| {
        DEFAULT_ENDPOINT.to_string()
      })
  }

  pub fn geocode_suffix(
    &self
  ) -> String {
    self
      .get("geocode.suffix")
      .unwrap_or_else(|| {
        DEFAULT_SUFFIX.to_string()
      })
  }

  pub fn map_settings(
    &self
  ) -> anyhow::Result<MapSettings> {
    let defaults = MapSettings::default();

    let default_center = match self
      .get("map.center")
    {
      | Some(raw) => parse_lat_lng(&raw)
        .with_context(|| {
          format!(
            "invalid map.center: {raw}"
          )
        })?,
      | None => defaults.default_center
    };
    let initial_zoom = self
      .parse_zoom("map.zoom")?
      .unwrap_or(defaults.initial_zoom);
    let focus_zoom = self
      .parse_zoom("map.focus_zoom")?
      .unwrap_or(defaults.focus_zoom);

    Ok(MapSettings {
      default_center,
      initial_zoom,
      focus_zoom
    })
  }

  fn parse_zoom(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u8>> {
    let Some(raw) = self.get(key) else {
      return Ok(None);
    };
    let zoom = raw
      .trim()
      .parse::<u8>()
      .with_context(|| {
        format!("invalid {key}: {raw}")
      })?;
    if zoom > 19 {
      return Err(anyhow!(
        "{key} must be at most 19, \
         got {zoom}"
      ));
    }
    Ok(Some(zoom))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include already loaded; skipping");
        } else if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

pub fn parse_lat_lng(
  raw: &str
) -> anyhow::Result<LatLng> {
  let (lat, lng) = raw
    .split_once(',')
    .ok_or_else(|| {
      anyhow!("expected LAT,LNG, got: {raw}")
    })?;
  let lat = lat
    .trim()
    .parse::<f64>()
    .with_context(|| {
      format!("invalid latitude: {lat}")
    })?;
  let lng = lng
    .trim()
    .parse::<f64>()
    .with_context(|| {
      format!("invalid longitude: {lng}")
    })?;

  if !(-90.0..=90.0).contains(&lat)
    || !(-180.0..=180.0).contains(&lng)
  {
    return Err(anyhow!(
      "coordinates out of range: \
       {lat},{lng}"
    ));
  }
  Ok(LatLng::new(lat, lng))
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping outingrc"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::{
    Config,
    parse_lat_lng
  };
  use crate::markers::LatLng;

  #[test]
  fn defaults_describe_glasgow() {
    let cfg = Config::default();
    let settings = cfg
      .map_settings()
      .expect("default settings");
    assert_eq!(
      settings.default_center,
      LatLng::new(55.8642, -4.2518)
    );
    assert_eq!(settings.initial_zoom, 13);
    assert_eq!(settings.focus_zoom, 15);
    assert_eq!(
      cfg.geocode_suffix(),
      "Glasgow, UK"
    );
    assert_eq!(cfg.get_bool("color"), Some(true));
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let extra = dir.path().join("map.rc");
    fs::write(
      &extra,
      "map.zoom = 11 # closer\n"
    )
    .expect("write include");
    let rc = dir.path().join("outingrc");
    fs::write(
      &rc,
      "# outing settings\n\
       events.file = events.json\n\
       include map.rc\n\
       geocode.suffix = Edinburgh, UK\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.geocode_suffix(),
      "Edinburgh, UK"
    );

    cfg.apply_overrides(vec![(
      "rc.map.focus_zoom".to_string(),
      "17".to_string()
    )]);
    let settings = cfg
      .map_settings()
      .expect("settings");
    assert_eq!(settings.initial_zoom, 11);
    assert_eq!(settings.focus_zoom, 17);
  }

  #[test]
  fn malformed_lines_and_values_are_errors()
  {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let rc = dir.path().join("outingrc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(Config::load(Some(rc.as_path())).is_err());

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "map.zoom".to_string(),
      "40".to_string()
    )]);
    assert!(cfg.map_settings().is_err());

    assert!(parse_lat_lng("91,0").is_err());
    assert!(parse_lat_lng("55.9").is_err());
  }
}
