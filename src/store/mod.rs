use std::path::{Path, PathBuf};

use crate::core::{
    PlanDb, PlanDbArg, PlanDbOp, PlanDbType, PlanMemento, PlanSpecification, RequestKind,
};

const TREE_PLANS: &str = "plans";
const TREE_MEMENTOS: &str = "mementos";

#[derive(Debug)]
pub enum StoreError {
    /// The store was asked for work while closed.
    Closed,
    Db(sled::Error),
    Codec(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Closed => write!(f, "plan store is closed"),
            StoreError::Db(e) => write!(f, "{}", e),
            StoreError::Codec(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sled::Error> for StoreError {
    fn from(value: sled::Error) -> Self {
        StoreError::Db(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Codec(value)
    }
}

struct Trees {
    db: sled::Db,
    plans: sled::Tree,
    mementos: sled::Tree,
}

/// Gateway to the persistent plan database.
///
/// Holds plan specifications and plan mementos keyed by id. All access is
/// synchronous and runs on the engine thread; concurrent writers are not
/// supported.
pub struct PlanStore {
    path: PathBuf,
    trees: Option<Trees>,
}

impl PlanStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            path: directory.as_ref().join("plan.db"),
            trees: None,
        }
    }

    /// Open the store. Calling open on an open store is a no-op.
    pub fn open(&mut self) -> Result<(), StoreError> {
        if self.trees.is_some() {
            return Ok(());
        }

        let db = sled::open(&self.path)?;
        let plans = db.open_tree(TREE_PLANS)?;
        let mementos = db.open_tree(TREE_MEMENTOS)?;

        log::debug!("Plan store open at {}", self.path.display());

        self.trees = Some(Trees {
            db,
            plans,
            mementos,
        });

        Ok(())
    }

    /// Flush and release the store.
    pub fn close(&mut self) {
        if let Some(trees) = self.trees.take() {
            if let Err(e) = trees.db.flush() {
                log::error!("Failed to flush plan store: {}", e);
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.trees.is_some()
    }

    fn trees(&self) -> Result<&Trees, StoreError> {
        self.trees.as_ref().ok_or(StoreError::Closed)
    }

    pub fn store_plan(&self, spec: &PlanSpecification) -> Result<(), StoreError> {
        let trees = self.trees()?;

        trees
            .plans
            .insert(spec.plan_id.as_bytes(), serde_json::to_vec(spec)?)?;

        Ok(())
    }

    pub fn store_memento(&self, memento: &PlanMemento) -> Result<(), StoreError> {
        let trees = self.trees()?;

        trees
            .mementos
            .insert(memento.id.as_bytes(), serde_json::to_vec(memento)?)?;

        Ok(())
    }

    pub fn lookup_plan(&self, id: &str) -> Result<Option<PlanSpecification>, StoreError> {
        match self.trees()?.plans.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn lookup_memento(&self, id: &str) -> Result<Option<PlanMemento>, StoreError> {
        match self.trees()?.mementos.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Handle an externally initiated database operation and build the paired
    /// reply. A returned error indicates the store itself failed, not that
    /// the requested record was absent.
    pub fn on_plan_db(&mut self, request: &PlanDb) -> Result<PlanDb, StoreError> {
        let mut reply = PlanDb {
            kind: RequestKind::Success,
            op: request.op,
            request_id: request.request_id,
            object_type: request.object_type,
            object_id: request.object_id.clone(),
            arg: None,
            info: String::new(),
        };

        match (request.op, request.object_type) {
            (PlanDbOp::Set, PlanDbType::Plan) => match &request.arg {
                Some(PlanDbArg::Spec(spec)) => self.store_plan(spec)?,
                _ => fail(&mut reply, "set requires a plan specification argument"),
            },
            (PlanDbOp::Set, PlanDbType::Memento) => match &request.arg {
                Some(PlanDbArg::Memento(memento)) => self.store_memento(memento)?,
                _ => fail(&mut reply, "set requires a memento argument"),
            },
            (PlanDbOp::Get, PlanDbType::Plan) => match self.lookup_plan(&request.object_id)? {
                Some(spec) => reply.arg = Some(PlanDbArg::Spec(spec)),
                None => fail(&mut reply, "plan not found"),
            },
            (PlanDbOp::Get, PlanDbType::Memento) => {
                match self.lookup_memento(&request.object_id)? {
                    Some(memento) => reply.arg = Some(PlanDbArg::Memento(memento)),
                    None => fail(&mut reply, "memento not found"),
                }
            }
            (PlanDbOp::Del, object_type) => {
                let trees = self.trees()?;
                let tree = match object_type {
                    PlanDbType::Plan => &trees.plans,
                    PlanDbType::Memento => &trees.mementos,
                };

                if tree.remove(request.object_id.as_bytes())?.is_none() {
                    fail(&mut reply, "no such record");
                }
            }
            (PlanDbOp::Clear, object_type) => {
                let trees = self.trees()?;
                match object_type {
                    PlanDbType::Plan => trees.plans.clear()?,
                    PlanDbType::Memento => trees.mementos.clear()?,
                }
            }
        }

        Ok(reply)
    }
}

fn fail(reply: &mut PlanDb, info: &str) {
    reply.kind = RequestKind::Failure;
    reply.info = info.to_owned();
}
