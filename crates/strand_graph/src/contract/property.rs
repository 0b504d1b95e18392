use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use strand_utils::hash::HashMap;

use crate::attrs::ShouldSerialize;
use crate::convert::Converter;
use crate::error::ContractIssue;
use crate::heap::Heap;
use crate::info::{BoxError, Getter, Setter, TypeKey};
use crate::settings::{
    DefaultValueHandling, NullValueHandling, ObjectCreationHandling, ReferenceLoopHandling,
    Required, TypeNameHandling,
};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// Property

/// How one member of an object is written and read.
///
/// Policy fields left as `None` defer to the container and then to the
/// serializer settings.
#[derive(Clone)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) underlying_name: String,
    pub(crate) declaring_type: TypeKey,
    pub(crate) property_type: TypeKey,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
    pub(crate) ignored: bool,
    pub(crate) has_member_attribute: bool,
    pub(crate) order: Option<i32>,
    pub(crate) required: Option<Required>,
    pub(crate) default_value: Option<Value>,
    pub(crate) null_value_handling: Option<NullValueHandling>,
    pub(crate) default_value_handling: Option<DefaultValueHandling>,
    pub(crate) reference_loop_handling: Option<ReferenceLoopHandling>,
    pub(crate) object_creation_handling: Option<ObjectCreationHandling>,
    pub(crate) type_name_handling: Option<TypeNameHandling>,
    pub(crate) is_reference: Option<bool>,
    pub(crate) item_is_reference: Option<bool>,
    pub(crate) item_reference_loop_handling: Option<ReferenceLoopHandling>,
    pub(crate) item_type_name_handling: Option<TypeNameHandling>,
    pub(crate) item_converter: Option<Arc<dyn Converter>>,
    pub(crate) converter: Option<Arc<dyn Converter>>,
    pub(crate) should_serialize: Option<ShouldSerialize>,
}

impl Property {
    /// A property with no accessors and no options.
    pub fn new(name: impl Into<String>, property_type: TypeKey, declaring_type: TypeKey) -> Self {
        let name = name.into();
        Self {
            underlying_name: name.clone(),
            name,
            declaring_type,
            property_type,
            getter: None,
            setter: None,
            readable: false,
            writable: false,
            ignored: false,
            has_member_attribute: false,
            order: None,
            required: None,
            default_value: None,
            null_value_handling: None,
            default_value_handling: None,
            reference_loop_handling: None,
            object_creation_handling: None,
            type_name_handling: None,
            is_reference: None,
            item_is_reference: None,
            item_reference_loop_handling: None,
            item_type_name_handling: None,
            item_converter: None,
            converter: None,
            should_serialize: None,
        }
    }

    /// Serialized name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the member this property was built from.
    #[inline]
    pub fn underlying_name(&self) -> &str {
        &self.underlying_name
    }

    #[inline]
    pub fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    #[inline]
    pub fn property_type(&self) -> TypeKey {
        self.property_type
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    #[inline]
    pub fn has_member_attribute(&self) -> bool {
        self.has_member_attribute
    }

    #[inline]
    pub fn order(&self) -> Option<i32> {
        self.order
    }

    #[inline]
    pub fn required(&self) -> Option<Required> {
        self.required
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    #[inline]
    pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
        self.converter.as_ref()
    }

    #[inline]
    pub fn is_reference(&self) -> Option<bool> {
        self.is_reference
    }

    #[inline]
    pub fn type_name_handling(&self) -> Option<TypeNameHandling> {
        self.type_name_handling
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_ignored(&mut self, ignored: bool) {
        self.ignored = ignored;
    }

    pub fn set_order(&mut self, order: Option<i32>) {
        self.order = order;
    }

    pub fn set_required(&mut self, required: Option<Required>) {
        self.required = required;
    }

    pub fn set_converter(&mut self, converter: Option<Arc<dyn Converter>>) {
        self.converter = converter;
    }

    pub fn get_value(&self, heap: &Heap, target: ObjectId) -> Result<Value, BoxError> {
        match &self.getter {
            Some(getter) => getter.get(heap, target),
            None => Err(BoxError::from(alloc::format!(
                "property '{}' cannot be read",
                self.name
            ))),
        }
    }

    pub fn set_value(&self, heap: &mut Heap, target: ObjectId, value: Value) -> Result<(), BoxError> {
        match &self.setter {
            Some(setter) => setter.set(heap, target, value),
            None => Err(BoxError::from(alloc::format!(
                "property '{}' cannot be written",
                self.name
            ))),
        }
    }

    /// Requirement after applying the container default.
    #[inline]
    pub fn resolved_required(&self, container: Option<Required>) -> Required {
        self.required.or(container).unwrap_or_default()
    }

    #[inline]
    pub(crate) fn should_serialize(&self, heap: &Heap, target: ObjectId) -> bool {
        self.should_serialize
            .as_ref()
            .is_none_or(|predicate| (predicate.0)(heap, target))
    }
}

impl core::fmt::Debug for Property {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("underlying_name", &self.underlying_name)
            .field("property_type", &self.property_type)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .field("ignored", &self.ignored)
            .field("order", &self.order)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// PropertyCollection

/// Ordered properties with unique serialized names.
#[derive(Clone, Default, Debug)]
pub struct PropertyCollection {
    items: Vec<Property>,
    index: HashMap<String, usize>,
}

impl PropertyCollection {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a property; its serialized name must be unused.
    pub fn push(&mut self, property: Property) -> Result<(), ContractIssue> {
        if self.index.contains_key(&property.name) {
            return Err(ContractIssue::DuplicateProperty(property.name));
        }
        self.index.insert(property.name.clone(), self.items.len());
        self.items.push(property);
        Ok(())
    }

    /// Exact match on the serialized name.
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    /// Exact match first, then the first case-insensitive match.
    pub fn get_closest(&self, name: &str) -> Option<&Property> {
        self.position_closest(name).map(|i| &self.items[i])
    }

    pub fn position_closest(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied().or_else(|| {
            self.items
                .iter()
                .position(|p| p.name.eq_ignore_ascii_case(name))
        })
    }

    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, Property> {
        self.items.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Property] {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Mutable access for contract factories; serialized names must stay
    /// unique, use [`Self::rename`] to change them.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.index.get(name).map(|&i| &mut self.items[i])
    }

    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> Result<(), ContractIssue> {
        let to = to.into();
        if self.index.contains_key(&to) {
            return Err(ContractIssue::DuplicateProperty(to));
        }
        let Some(i) = self.index.remove(from) else {
            return Ok(());
        };
        self.items[i].name = to.clone();
        self.index.insert(to, i);
        Ok(())
    }

    /// Explicitly ordered properties first, ascending, then the rest in
    /// their current order.
    pub(crate) fn sort_by_order(&mut self) {
        self.items.sort_by_key(|p| match p.order {
            Some(order) => (0, order),
            None => (1, 0),
        });
        self.index.clear();
        for (i, p) in self.items.iter().enumerate() {
            self.index.insert(p.name.clone(), i);
        }
    }
}

impl<'a> IntoIterator for &'a PropertyCollection {
    type Item = &'a Property;
    type IntoIter = core::slice::Iter<'a, Property>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Property, PropertyCollection};
    use crate::error::ContractIssue;
    use crate::info::TypeKey;

    fn prop(name: &str, order: Option<i32>) -> Property {
        let mut p = Property::new(name, TypeKey::I32, TypeKey::ANY);
        p.order = order;
        p
    }

    #[test]
    fn closest_match() {
        let mut props = PropertyCollection::new();
        props.push(prop("Name", None)).unwrap();
        props.push(prop("name", None)).unwrap();
        props.push(prop("Id", None)).unwrap();
        assert_eq!(props.get_closest("name").unwrap().name(), "name");
        assert_eq!(props.get_closest("ID").unwrap().name(), "Id");
        assert!(props.get_closest("missing").is_none());
    }

    #[test]
    fn duplicate() {
        let mut props = PropertyCollection::new();
        props.push(prop("A", None)).unwrap();
        assert_eq!(
            props.push(prop("A", None)),
            Err(ContractIssue::DuplicateProperty("A".into()))
        );
        assert!(props.rename("A", "B").is_ok());
        assert!(props.get("B").is_some());
    }

    #[test]
    fn ordering() {
        let mut props = PropertyCollection::new();
        props.push(prop("A", None)).unwrap();
        props.push(prop("B", None)).unwrap();
        props.push(prop("C", Some(1))).unwrap();
        props.push(prop("D", None)).unwrap();
        props.sort_by_order();
        let names: Vec<_> = props.iter().map(Property::name).collect();
        assert_eq!(names, ["C", "A", "B", "D"]);
        assert_eq!(props.get("A").unwrap().name(), "A");
    }
}
