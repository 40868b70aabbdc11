//! Workspace - the collections, independent requests and environments a
//! user works with, plus the active environment selection.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Collection, Environment, Request, Variable};
use crate::store::RemoteStore;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub independent_requests: Vec<Request>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub active_environment_id: Option<String>,
}

impl Workspace {
    /// Fetch everything from the remote store
    pub async fn load(store: &RemoteStore) -> Result<Self> {
        let collections = store.list_collections().await?;
        let independent_requests = store.list_requests().await?;
        let environments = store.list_environments().await?;
        tracing::info!(
            collections = collections.len(),
            requests = independent_requests.len(),
            environments = environments.len(),
            "Workspace loaded"
        );
        Ok(Workspace {
            collections,
            independent_requests,
            environments,
            active_environment_id: None,
        })
    }

    pub fn find_request(&self, id: &str) -> Option<&Request> {
        self.collections
            .iter()
            .flat_map(|c| c.all_requests())
            .chain(self.independent_requests.iter())
            .find(|r| r.id == id)
    }

    fn find_request_mut(&mut self, id: &str) -> Option<&mut Request> {
        self.collections
            .iter_mut()
            .flat_map(|c| c.all_requests_mut())
            .chain(self.independent_requests.iter_mut())
            .find(|r| r.id == id)
    }

    /// Look a request up by id, falling back to its name
    pub fn find_request_by_name_or_id(&self, needle: &str) -> Option<&Request> {
        self.find_request(needle).or_else(|| {
            self.collections
                .iter()
                .flat_map(|c| c.all_requests())
                .chain(self.independent_requests.iter())
                .find(|r| r.name == needle)
        })
    }

    /// Replace the stored copy of a request, keeping its owner. Returns false
    /// when the id is unknown.
    pub fn update_request(&mut self, request: &Request) -> bool {
        match self.find_request_mut(&request.id) {
            Some(stored) => {
                *stored = request.clone();
                true
            }
            None => false,
        }
    }

    pub fn remove_request(&mut self, id: &str) -> Option<Request> {
        if let Some(pos) = self.independent_requests.iter().position(|r| r.id == id) {
            return Some(self.independent_requests.remove(pos));
        }
        for collection in &mut self.collections {
            if let Some(pos) = collection.requests.iter().position(|r| r.id == id) {
                return Some(collection.requests.remove(pos));
            }
            for folder in &mut collection.folders {
                if let Some(pos) = folder.requests.iter().position(|r| r.id == id) {
                    return Some(folder.requests.remove(pos));
                }
            }
        }
        None
    }

    /// The collection holding the request directly or through a folder
    pub fn owning_collection(&self, request_id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.owns(request_id))
    }

    pub fn active_environment(&self) -> Option<&Environment> {
        let id = self.active_environment_id.as_deref()?;
        self.environments.iter().find(|e| e.id == id)
    }

    /// Select the active environment by id or name
    pub fn set_active_environment(&mut self, needle: Option<&str>) -> bool {
        match needle {
            None => {
                self.active_environment_id = None;
                true
            }
            Some(needle) => {
                let found = self
                    .environments
                    .iter()
                    .find(|e| e.id == needle || e.name == needle)
                    .map(|e| e.id.clone());
                let ok = found.is_some();
                if ok {
                    self.active_environment_id = found;
                }
                ok
            }
        }
    }

    /// `[collection variables, active environment variables]`, lowest
    /// precedence first. Missing scopes are empty.
    pub fn scope_chain(&self, request_id: &str) -> Vec<Vec<Variable>> {
        let collection = self
            .owning_collection(request_id)
            .map(|c| c.variables.clone())
            .unwrap_or_default();
        let environment = self
            .active_environment()
            .map(|e| e.variables.clone())
            .unwrap_or_default();
        vec![collection, environment]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Folder;

    pub(crate) fn sample() -> Workspace {
        let mut collection = Collection::new("c1", "API");
        collection.variables = vec![Variable::new("h", "c"), Variable::new("only_c", "1")];
        collection.requests.push(Request::new("r1", "direct"));
        collection.folders.push(Folder {
            id: "f1".into(),
            name: "nested".into(),
            requests: vec![Request::new("r2", "in folder")],
        });

        let mut env = Environment::new("e1", "prod");
        env.set("h", "e");

        Workspace {
            collections: vec![collection],
            independent_requests: vec![Request::new("r3", "draft")],
            environments: vec![env],
            active_environment_id: Some("e1".into()),
        }
    }

    #[test]
    fn test_scope_chain_for_collection_request() {
        let ws = sample();
        let chain = ws.scope_chain("r2");
        assert_eq!(chain[0][0], Variable::new("h", "c"));
        assert_eq!(chain[1], vec![Variable::new("h", "e")]);
    }

    #[test]
    fn test_scope_chain_for_independent_request() {
        let ws = sample();
        let chain = ws.scope_chain("r3");
        assert!(chain[0].is_empty());
        assert_eq!(chain[1], vec![Variable::new("h", "e")]);
    }

    #[test]
    fn test_no_active_environment() {
        let mut ws = sample();
        assert!(ws.set_active_environment(None));
        assert!(ws.scope_chain("r1")[1].is_empty());
        assert!(!ws.set_active_environment(Some("staging")));
        assert!(ws.set_active_environment(Some("prod")));
        assert_eq!(ws.active_environment_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_update_request_in_folder() {
        let mut ws = sample();
        let mut edited = ws.find_request("r2").cloned().unwrap();
        edited.url = "https://changed".into();
        assert!(ws.update_request(&edited));
        assert_eq!(ws.find_request("r2").unwrap().url, "https://changed");
        assert!(!ws.update_request(&Request::new("nope", "x")));
    }

    #[test]
    fn test_remove_and_lookup_by_name() {
        let mut ws = sample();
        assert_eq!(ws.find_request_by_name_or_id("draft").unwrap().id, "r3");
        assert!(ws.remove_request("r2").is_some());
        assert!(ws.find_request("r2").is_none());
        assert!(ws.remove_request("r2").is_none());
    }
}
