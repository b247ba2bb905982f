use serde_json::{json, Map, Value};

/// Hash function identifying an element of a set-typed field.
pub type SetHashFn = fn(&Value) -> u32;

/// Transforms a configured value into the value tracked in state.
pub type StateFn = fn(&Value) -> Value;

/// The type of a schema field.
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Bool,
    Int,
    Map,
    /// Unordered collection; element identity comes from the field's set hash.
    Set(Box<FieldType>),
    /// Nested block with its own fields. Only valid as a set element.
    Block(Vec<Field>),
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Map => "map",
            FieldType::Set(_) => "set",
            FieldType::Block(_) => "block",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FieldType::Set(elem) => json!({ "set": elem.to_json() }),
            FieldType::Block(fields) => {
                let attrs: Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.name.to_string(), f.to_json()))
                    .collect();
                json!({ "block": attrs })
            }
            other => Value::String(other.name().to_string()),
        }
    }
}

/// Metadata for one field of a resource schema.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub default: Option<Value>,
    /// Deprecation message for a field kept only to reject old configs.
    pub removed: Option<&'static str>,
    pub set_hash: Option<SetHashFn>,
    pub state_func: Option<StateFn>,
}

impl Field {
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            default: None,
            removed: None,
            set_hash: None,
            state_func: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn removed(mut self, message: &'static str) -> Self {
        self.removed = Some(message);
        self
    }

    pub fn set_hash(mut self, f: SetHashFn) -> Self {
        self.set_hash = Some(f);
        self
    }

    pub fn state_func(mut self, f: StateFn) -> Self {
        self.state_func = Some(f);
        self
    }

    /// Whether a change to this field can only be applied by replacement.
    ///
    /// A set of blocks forces replacement if any of its block fields does.
    pub fn forces_replacement(&self) -> bool {
        if self.force_new {
            return true;
        }
        match &self.ty {
            FieldType::Set(elem) => match elem.as_ref() {
                FieldType::Block(fields) => fields.iter().any(Field::forces_replacement),
                _ => false,
            },
            _ => false,
        }
    }

    /// Block fields of a set-of-blocks field, if this is one.
    pub fn block_fields(&self) -> Option<&[Field]> {
        match &self.ty {
            FieldType::Set(elem) => match elem.as_ref() {
                FieldType::Block(fields) => Some(fields),
                _ => None,
            },
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), self.ty.to_json());
        for (flag, set) in [
            ("required", self.required),
            ("optional", self.optional),
            ("computed", self.computed),
            ("force_new", self.force_new),
        ] {
            if set {
                obj.insert(flag.to_string(), Value::Bool(true));
            }
        }
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if let Some(message) = self.removed {
            obj.insert("removed".to_string(), Value::String(message.to_string()));
        }
        Value::Object(obj)
    }
}

/// An ordered set of fields describing one resource type.
#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render the schema as JSON.
    pub fn to_json(&self) -> Value {
        let attrs: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.to_json()))
            .collect();
        json!({ "attributes": attrs })
    }
}
