/// Fields scraped from the lookup site for one barcode.
///
/// Both fields are independently optional. A missing description counts as
/// a failed lookup; a missing image only means a description-only update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupResult {
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl LookupResult {
    pub fn is_found(&self) -> bool {
        self.description.is_some()
    }
}
