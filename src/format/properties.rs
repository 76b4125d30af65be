use std::collections::BTreeMap;

use super::detect::SlideFormat;

/// Slide-level metadata taken from the first ImageDescription.
///
/// Aperio descriptions look like
/// `Aperio Image Library v12\n46920x33600 ...|AppMag = 20|MPP = 0.499`;
/// every `key = value` part between pipes is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideProperties {
    pub vendor: Option<String>,

    /// Microns per pixel at level 0
    pub mpp: Option<f64>,

    /// Objective power
    pub magnification: Option<f64>,

    pub description: Option<String>,
    pub values: BTreeMap<String, String>,
}

impl SlideProperties {
    pub fn parse(format: SlideFormat, description: Option<&str>) -> Self {
        let mut props = SlideProperties {
            vendor: Some(format.vendor().to_string()),
            description: description.map(str::to_string),
            ..Default::default()
        };

        let Some(description) = description else {
            return props;
        };
        if format != SlideFormat::AperioSvs {
            return props;
        }

        for part in description.split('|') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "MPP" => props.mpp = value.parse().ok(),
                "AppMag" => props.magnification = value.parse().ok(),
                _ => {}
            }
            props.values.insert(key.to_string(), value.to_string());
        }

        props
    }
}
