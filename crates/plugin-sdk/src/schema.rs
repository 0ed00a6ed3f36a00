//! Structural schemas for endpoint payloads.
//!
//! A schema describes the shape of a JSON value: its primitive type, or for
//! objects the named fields and whether each is required. Plugins attach a
//! schema to an endpoint's input and/or output; the kernel validates payloads
//! against it and publishes it in the generated API documentation.

/// The shape of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Accepts any value.
    Any,
    String,
    /// A string with at least one non-whitespace character.
    NonBlankString,
    /// A JSON number with no fractional part.
    Integer,
    Number,
    Boolean,
    /// Homogeneous array whose items match the inner schema.
    Array(Box<Schema>),
    Object(ObjectSchema),
    /// `null` or a value matching the inner schema.
    Nullable(Box<Schema>),
}

impl Schema {
    /// Start building an object schema.
    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    pub fn nullable(inner: Schema) -> Self {
        Schema::Nullable(Box::new(inner))
    }

    /// Short type name used in validation messages and documentation.
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::String | Schema::NonBlankString => "string",
            Schema::Integer => "integer",
            Schema::Number => "number",
            Schema::Boolean => "boolean",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Nullable(inner) => inner.type_name(),
        }
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        Schema::Object(object)
    }
}

/// One named field of an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
    pub description: Option<String>,
}

/// Object shape: ordered fields plus a policy for unknown keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub fields: Vec<Field>,
    /// When false (the default) keys not listed in `fields` are rejected.
    pub allow_additional: bool,
}

impl ObjectSchema {
    /// Add a required field.
    pub fn field(self, name: impl Into<String>, schema: Schema) -> Self {
        self.push(name.into(), schema, true, None)
    }

    /// Add an optional field.
    pub fn optional(self, name: impl Into<String>, schema: Schema) -> Self {
        self.push(name.into(), schema, false, None)
    }

    /// Add a required field with a documentation string.
    pub fn described(
        self,
        name: impl Into<String>,
        schema: Schema,
        description: impl Into<String>,
    ) -> Self {
        self.push(name.into(), schema, true, Some(description.into()))
    }

    /// Accept keys that are not declared.
    pub fn allow_additional(mut self) -> Self {
        self.allow_additional = true;
        self
    }

    /// Finish the builder.
    pub fn build(self) -> Schema {
        Schema::Object(self)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn push(
        mut self,
        name: String,
        schema: Schema,
        required: bool,
        description: Option<String>,
    ) -> Self {
        // Redeclaring a field replaces it in place.
        let field = Field {
            name,
            schema,
            required,
            description,
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }
}
