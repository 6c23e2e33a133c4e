/// A single content line, kept as close to the wire form as possible.
///
/// Property values keep their escaping. Parameter values are stored without
/// surrounding quotes and are quoted again on output where needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

/// Any nested block that is not modelled on its own, e.g. `VTIMEZONE` or `VALARM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub uid: String,
    pub dtstamp: Option<String>,
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calendar {
    pub prod_id: Option<String>,
    pub version: Option<String>,
    pub cal_scale: Option<String>,
    pub method: Option<String>,
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
    pub events: Vec<Event>,
}

impl Property {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Looks up a parameter by case-insensitive name.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}

impl Component {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.name.eq_ignore_ascii_case(name))
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl Event {
    pub fn new<S: Into<String>>(uid: S) -> Self {
        Self {
            uid: uid.into(),
            dtstamp: None,
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.name.eq_ignore_ascii_case(name))
    }
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills missing `VERSION` and `CALSCALE` with the RFC 5545 defaults.
    pub fn with_defaults(&mut self) -> &mut Self {
        self.version.get_or_insert_with(|| "2.0".to_string());
        self.cal_scale.get_or_insert_with(|| "GREGORIAN".to_string());
        self
    }

    pub fn timezones(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .filter(|component| component.is("VTIMEZONE"))
    }
}
