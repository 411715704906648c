use crate::GtuTypeId;

/// A class of GTUs (car, truck, bus, ...), used to filter which lanes they may use.
#[derive(Clone, Debug)]
pub struct GtuType {
    id: GtuTypeId,
    name: String,
}

impl GtuType {
    pub(crate) fn new(id: GtuTypeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
        }
    }

    /// Gets the GTU type's ID.
    pub fn id(&self) -> GtuTypeId {
        self.id
    }

    /// Gets the name of the GTU type.
    pub fn name(&self) -> &str {
        &self.name
    }
}
