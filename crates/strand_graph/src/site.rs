//! Position of a value relative to its enclosing member and container.

use alloc::sync::Arc;

use crate::contract::{Contract, Property};
use crate::convert::Converter;
use crate::settings::{ReferenceLoopHandling, TypeNameHandling};

// -----------------------------------------------------------------------------
// Site

/// Where a value sits in the graph.
#[derive(Clone, Copy, Default)]
pub(crate) struct Site<'c> {
    /// The property holding the value.
    pub member: Option<&'c Property>,
    /// The contract of the container holding the value.
    pub container: Option<&'c Contract>,
    /// The property through which that container was reached.
    pub container_property: Option<&'c Property>,
}

impl<'c> Site<'c> {
    /// Site of a value stored directly in `container`.
    #[inline]
    pub fn item_of(container: &'c Contract, container_property: Option<&'c Property>) -> Self {
        Self {
            member: None,
            container: Some(container),
            container_property,
        }
    }

    pub fn converter(&self) -> Option<&'c Arc<dyn Converter>> {
        self.member
            .and_then(|p| p.converter.as_ref())
            .or_else(|| self.container_property.and_then(|p| p.item_converter.as_ref()))
            .or_else(|| {
                self.container
                    .and_then(Contract::items)
                    .and_then(|items| items.converter.as_ref())
            })
    }

    pub fn is_reference(&self) -> Option<bool> {
        self.member
            .and_then(|p| p.is_reference)
            .or_else(|| self.container_property.and_then(|p| p.item_is_reference))
            .or_else(|| {
                self.container
                    .and_then(Contract::items)
                    .and_then(|items| items.is_reference)
            })
    }

    pub fn reference_loop_handling(&self) -> Option<ReferenceLoopHandling> {
        self.member
            .and_then(|p| p.reference_loop_handling)
            .or_else(|| {
                self.container_property
                    .and_then(|p| p.item_reference_loop_handling)
            })
            .or_else(|| {
                self.container
                    .and_then(Contract::items)
                    .and_then(|items| items.reference_loop_handling)
            })
    }

    pub fn type_name_handling(&self) -> Option<TypeNameHandling> {
        self.member
            .and_then(|p| p.type_name_handling)
            .or_else(|| self.container_property.and_then(|p| p.item_type_name_handling))
            .or_else(|| {
                self.container
                    .and_then(Contract::items)
                    .and_then(|items| items.type_name_handling)
            })
    }
}
