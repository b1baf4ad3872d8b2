use strum_macros::EnumString;

/// Physical axis a posterior surface can span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AxisParam {
    /// Distance modulus
    Dm,
    /// r-band extinction
    Ar,
    /// Absolute r-band magnitude
    Mr,
    /// Metallicity
    FeH,
}

impl AxisParam {
    /// The label drawn on the plot axis.
    pub fn label(self) -> &'static str {
        match self {
            AxisParam::Dm => "μ",
            AxisParam::Ar => "A_r",
            AxisParam::Mr => "M_r",
            AxisParam::FeH => "Z",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("DM".parse::<AxisParam>().unwrap(), AxisParam::Dm);
        assert_eq!("dm".parse::<AxisParam>().unwrap(), AxisParam::Dm);
        assert_eq!("Ar".parse::<AxisParam>().unwrap(), AxisParam::Ar);
        assert_eq!("feh".parse::<AxisParam>().unwrap(), AxisParam::FeH);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("xyz".parse::<AxisParam>().is_err());
    }

    #[test]
    fn labels() {
        assert_eq!(AxisParam::Dm.label(), "μ");
        assert_eq!(AxisParam::FeH.label(), "Z");
    }
}
