//! Read-only reference catalog with id-indexed lookup.

use std::collections::HashMap;

use crate::models::{CollectionSite, Town};

/// The reference set of towns and collection sites, indexed by id.
///
/// Never mutated after construction; the reference import swaps in a whole
/// new catalog. List accessors preserve the configured ordering.
#[derive(Debug, Default)]
pub struct SiteCatalog {
    towns: Vec<Town>,
    town_index: HashMap<String, usize>,
    sites: Vec<CollectionSite>,
    site_index: HashMap<String, usize>,
    town_sites: HashMap<String, Vec<usize>>,
}

impl SiteCatalog {
    pub fn new(towns: Vec<Town>, sites: Vec<CollectionSite>) -> Self {
        let mut town_index = HashMap::new();
        for (i, town) in towns.iter().enumerate() {
            // first entry wins on duplicate ids
            town_index.entry(town.town_id.clone()).or_insert(i);
        }

        let mut site_index = HashMap::new();
        let mut town_sites: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, site) in sites.iter().enumerate() {
            site_index.entry(site.id.clone()).or_insert(i);
            town_sites.entry(site.town_id.clone()).or_default().push(i);
        }

        Self {
            towns,
            town_index,
            sites,
            site_index,
            town_sites,
        }
    }

    /// Towns in their configured order.
    pub fn towns(&self) -> &[Town] {
        &self.towns
    }

    /// Sites in their configured order.
    pub fn sites(&self) -> &[CollectionSite] {
        &self.sites
    }

    pub fn town(&self, town_id: &str) -> Option<&Town> {
        self.town_index.get(town_id).map(|&i| &self.towns[i])
    }

    pub fn find_site(&self, site_id: &str) -> Option<&CollectionSite> {
        self.site_index.get(site_id).map(|&i| &self.sites[i])
    }

    /// All curated sites within a town, in configured order.
    pub fn sites_for_town(&self, town_id: &str) -> Vec<&CollectionSite> {
        self.town_sites
            .get(town_id)
            .map(|indices| indices.iter().map(|&i| &self.sites[i]).collect())
            .unwrap_or_default()
    }

    pub fn has_sites(&self, town_id: &str) -> bool {
        self.town_sites
            .get(town_id)
            .is_some_and(|indices| !indices.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TownBounds;

    fn town(id: &str) -> Town {
        Town {
            town_id: id.to_string(),
            name: format!("Town {id}"),
            county: None,
            allows_roadside: true,
            bounds: TownBounds {
                west: -73.0,
                south: 44.0,
                east: -72.0,
                north: 45.0,
            },
        }
    }

    fn site(id: &str, town_id: &str) -> CollectionSite {
        CollectionSite {
            id: id.to_string(),
            town_id: town_id.to_string(),
            name: format!("Site {id}"),
            address: None,
            notes: None,
        }
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = SiteCatalog::new(
            vec![town("a"), town("b")],
            vec![site("s1", "a"), site("s2", "b"), site("s3", "a")],
        );

        assert_eq!(catalog.town("b").map(|t| t.name.as_str()), Some("Town b"));
        assert_eq!(
            catalog.find_site("s3").map(|s| s.town_id.as_str()),
            Some("a")
        );
        assert!(catalog.town("missing").is_none());
        assert!(catalog.find_site("missing").is_none());
    }

    #[test]
    fn test_sites_for_town_preserves_order() {
        let catalog = SiteCatalog::new(
            vec![town("a")],
            vec![site("s1", "a"), site("s2", "b"), site("s3", "a")],
        );

        let sites: Vec<&str> = catalog
            .sites_for_town("a")
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(sites, vec!["s1", "s3"]);
    }

    #[test]
    fn test_has_sites() {
        let catalog = SiteCatalog::new(vec![town("a"), town("b")], vec![site("s1", "a")]);

        assert!(catalog.has_sites("a"));
        assert!(!catalog.has_sites("b"));
        assert!(!catalog.has_sites("missing"));
    }

    #[test]
    fn test_duplicate_ids_keep_first_entry() {
        let mut second = town("a");
        second.name = "Shadowed".to_string();
        let catalog = SiteCatalog::new(vec![town("a"), second], vec![]);

        assert_eq!(catalog.town("a").map(|t| t.name.as_str()), Some("Town a"));
    }
}
