extern crate ini;
use super::config_error::*;
use ini::Ini;

pub fn load_ini(file_path: &str) -> Result<Ini, ConfigFileError> {
    let mut i = Ini::load_from_file(file_path).map_err(|e| match e {
        ini::Error::Io(_) => ConfigFileError::Nofile(file_path.to_owned()),
        ini::Error::Parse(_) => ConfigFileError::Parsing(file_path.to_owned()),
    })?;
    // strip trailing `; comment`
    for (_, prop) in i.iter_mut() {
        let stripped: Vec<(String, String)> = prop
            .iter()
            .map(|(k, v)| {
                let v = v.split(';').next().unwrap_or_default().trim();
                (k.to_owned(), v.to_owned())
            })
            .collect();
        for (k, v) in stripped {
            prop.insert(k, v);
        }
    }
    Ok(i)
}
