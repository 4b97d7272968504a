//! CoordinatedPersister — a credentialed, retrying session on the ensemble.
//!
//! Every path handed to the persister is resolved under the service's
//! storage root. The ensemble connection string and the credential are both
//! validated in [`CoordinatedPersisterBuilder::build`], before the store is
//! touched. [`CoordinatedPersisterBuilder::validate`] runs the same checks
//! for callers that must fail before even opening the store.

use keel_core::ServiceSpec;
use tracing::{debug, info};

use crate::credential::Credential;
use crate::ensemble::Ensemble;
use crate::error::{PersisterError, PersisterResult};
use crate::path;
use crate::persister::Persister;
use crate::retry::RetryPolicy;

pub struct CoordinatedPersister {
    ensemble: Ensemble,
    root: String,
    hosts: Vec<String>,
    acl: Option<String>,
    retry: RetryPolicy,
}

pub struct CoordinatedPersisterBuilder {
    root: String,
    connect: String,
    credential: Option<String>,
    retry: RetryPolicy,
}

impl CoordinatedPersisterBuilder {
    /// Access credential in `user:password` form. Parsed by `build`.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check the credential, connection string and root without touching
    /// any store. `build` runs the same checks.
    pub fn validate(&self) -> PersisterResult<()> {
        self.parse().map(|_| ())
    }

    pub fn build(self, ensemble: Ensemble) -> PersisterResult<CoordinatedPersister> {
        let (credential, hosts, root) = self.parse()?;

        info!(
            %root,
            hosts = %hosts.join(","),
            user = credential.as_ref().map(Credential::user),
            "coordination session established"
        );
        Ok(CoordinatedPersister {
            ensemble,
            root,
            hosts,
            acl: credential.map(|c| c.digest()),
            retry: self.retry,
        })
    }

    fn parse(&self) -> PersisterResult<(Option<Credential>, Vec<String>, String)> {
        let credential = self
            .credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::parse::<Credential>)
            .transpose()?;
        let hosts = parse_connect_string(&self.connect)?;
        let root = path::normalize(&self.root)?;
        Ok((credential, hosts, root))
    }
}

impl CoordinatedPersister {
    pub fn builder(root: impl Into<String>, connect: impl Into<String>) -> CoordinatedPersisterBuilder {
        CoordinatedPersisterBuilder {
            root: root.into(),
            connect: connect.into(),
            credential: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Builder configured from a service spec: derived (or overridden) root,
    /// ensemble connection string and optional credential.
    pub fn builder_for(spec: &ServiceSpec) -> CoordinatedPersisterBuilder {
        let root = spec
            .scheduler
            .coordination_root
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| path::service_root_path(&spec.name));
        let builder = Self::builder(root, spec.scheduler.coordination.clone());
        match &spec.scheduler.coordination_credential {
            Some(credential) => builder.credential(credential.clone()),
            None => builder,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    fn resolve(&self, relative: &str) -> PersisterResult<String> {
        path::join(&self.root, relative)
    }
}

impl Persister for CoordinatedPersister {
    fn get(&self, path: &str) -> PersisterResult<Vec<u8>> {
        let node = self.resolve(path)?;
        self.retry
            .run("get", || self.ensemble.read(self.acl.as_deref(), &node))
    }

    fn set(&self, path: &str, bytes: &[u8]) -> PersisterResult<()> {
        let node = self.resolve(path)?;
        self.retry
            .run("set", || self.ensemble.write(self.acl.as_deref(), &node, bytes))
    }

    fn delete(&self, path: &str) -> PersisterResult<()> {
        let node = self.resolve(path)?;
        let removed = self
            .retry
            .run("delete", || self.ensemble.remove(self.acl.as_deref(), &node))?;
        debug!(%node, removed, "deleted");
        Ok(())
    }

    fn children(&self, path: &str) -> PersisterResult<Vec<String>> {
        let node = self.resolve(path)?;
        self.retry
            .run("children", || self.ensemble.children(self.acl.as_deref(), &node))
    }
}

/// Parse a comma-separated `host:port` list.
fn parse_connect_string(connect: &str) -> PersisterResult<Vec<String>> {
    let mut hosts = Vec::new();
    for entry in connect.split(',').map(str::trim) {
        let (host, port) = entry
            .rsplit_once(':')
            .ok_or_else(|| PersisterError::InvalidConnection(format!("missing port in '{entry}'")))?;
        if host.is_empty() {
            return Err(PersisterError::InvalidConnection(format!("missing host in '{entry}'")));
        }
        port.parse::<u16>()
            .map_err(|_| PersisterError::InvalidConnection(format!("bad port in '{entry}'")))?;
        hosts.push(entry.to_string());
    }
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialError;

    fn persister(root: &str) -> CoordinatedPersister {
        CoordinatedPersister::builder(root, "zk-1:2181")
            .build(Ensemble::open_in_memory().unwrap())
            .unwrap()
    }

    #[test]
    fn paths_resolve_under_root() {
        let ensemble = Ensemble::open_in_memory().unwrap();
        let p = CoordinatedPersister::builder("/dcos-service-svc", "zk-1:2181")
            .build(ensemble.clone())
            .unwrap();
        p.set("Tasks/hello-0", b"x").unwrap();

        assert_eq!(ensemble.read(None, "/dcos-service-svc/Tasks/hello-0").unwrap(), b"x");
        assert_eq!(p.get("/Tasks/hello-0/").unwrap(), b"x");
        assert_eq!(p.children("/").unwrap(), vec!["Tasks"]);
    }

    #[test]
    fn delete_and_not_found() {
        let p = persister("/root");
        p.set("a/b", b"1").unwrap();
        p.delete("a").unwrap();
        assert!(p.get("a/b").unwrap_err().is_not_found());
        assert!(p.delete("a").unwrap_err().is_not_found());
    }

    #[test]
    fn bulk_helpers() {
        let p = persister("/root");
        let mut values = std::collections::BTreeMap::new();
        values.insert("x".to_string(), b"1".to_vec());
        values.insert("y/z".to_string(), b"2".to_vec());
        p.set_many(&values).unwrap();

        let got = p.get_many(&["x", "y/z", "missing"]).unwrap();
        assert_eq!(got["x"].as_deref(), Some(&b"1"[..]));
        assert_eq!(got["y/z"].as_deref(), Some(&b"2"[..]));
        assert_eq!(got["missing"], None);

        p.delete_all().unwrap();
        assert!(p.get("x").unwrap_err().is_not_found());
        // Nothing left to delete is not an error.
        p.delete_all().unwrap();
    }

    #[test]
    fn roots_isolate_services() {
        let ensemble = Ensemble::open_in_memory().unwrap();
        let a = CoordinatedPersister::builder("/dcos-service-a", "zk:2181")
            .build(ensemble.clone())
            .unwrap();
        let b = CoordinatedPersister::builder("/dcos-service-b", "zk:2181")
            .build(ensemble)
            .unwrap();
        a.set("servicename", b"a").unwrap();
        assert!(b.get("servicename").unwrap_err().is_not_found());
    }

    #[test]
    fn malformed_credential_fails_before_store_access() {
        let err = CoordinatedPersister::builder("/root", "zk:2181")
            .credential("no-colon-here")
            .build(Ensemble::open_in_memory().unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, PersisterError::Credential(CredentialError::Malformed)));
    }

    #[test]
    fn validate_needs_no_store() {
        assert!(CoordinatedPersister::builder("/root", "zk:2181")
            .credential("toto:tata")
            .validate()
            .is_ok());
        assert!(matches!(
            CoordinatedPersister::builder("/root", "zk:2181")
                .credential("no-colon-here")
                .validate(),
            Err(PersisterError::Credential(CredentialError::Malformed))
        ));
        assert!(matches!(
            CoordinatedPersister::builder("/root", "zk").validate(),
            Err(PersisterError::InvalidConnection(_))
        ));
    }

    #[test]
    fn credentialed_sessions_are_isolated() {
        let ensemble = Ensemble::open_in_memory().unwrap();
        let owner = CoordinatedPersister::builder("/root", "zk:2181")
            .credential("toto:tata")
            .build(ensemble.clone())
            .unwrap();
        let intruder = CoordinatedPersister::builder("/root", "zk:2181")
            .credential("toto:wrong")
            .build(ensemble.clone())
            .unwrap();
        let anonymous = CoordinatedPersister::builder("/root", "zk:2181")
            .build(ensemble)
            .unwrap();

        owner.set("secret", b"v").unwrap();
        assert_eq!(owner.get("secret").unwrap(), b"v");
        assert!(matches!(intruder.get("secret"), Err(PersisterError::AccessDenied(_))));
        assert!(matches!(anonymous.get("secret"), Err(PersisterError::AccessDenied(_))));
    }

    #[test]
    fn connect_string_validation() {
        assert_eq!(
            parse_connect_string("zk-1:2181, zk-2:2181").unwrap(),
            vec!["zk-1:2181", "zk-2:2181"]
        );
        assert!(parse_connect_string("zk-1").is_err());
        assert!(parse_connect_string(":2181").is_err());
        assert!(parse_connect_string("zk-1:notaport").is_err());
        assert!(parse_connect_string("zk-1:2181,").is_err());
    }

    #[test]
    fn builder_for_spec_uses_derived_or_overridden_root() {
        let mut spec = keel_core::ServiceSpec::from_toml_str(
            r#"
name = "myteam/database"
[scheduler]
principal = "p"
coordination = "master.mesos:2181"
"#,
        )
        .unwrap();
        let p = CoordinatedPersister::builder_for(&spec)
            .build(Ensemble::open_in_memory().unwrap())
            .unwrap();
        assert_eq!(p.root(), "/dcos-service-myteam__database");
        assert_eq!(p.hosts(), ["master.mesos:2181".to_string()]);

        spec.scheduler.coordination_root = Some("/custom/root".to_string());
        let p = CoordinatedPersister::builder_for(&spec)
            .build(Ensemble::open_in_memory().unwrap())
            .unwrap();
        assert_eq!(p.root(), "/custom/root");
    }
}
