//! Filters: transforms over the discovered target list.
//!
//! - `(id)`: leaves the list alone
//! - `(list F1 F2 ...)`: applies each child filter in turn
//! - `(first)`: drops the first target
//! - `(ec2-instance-id REGION)`: replaces instance ids with public addresses

use crate::ec2::{self, InstanceLookup};
use crate::error::Result;
use crate::registry::{
    Arg, Family, Plugin, Registry, children, literal, require_no_arguments, single,
};
use crate::target::{self, Target};
use std::fmt;
use std::sync::Arc;

pub const ID: &str = "id";
pub const LIST: &str = "list";
pub const FIRST: &str = "first";
pub const EC2_INSTANCE_ID: &str = "ec2-instance-id";

/// Transforms an ordered target list.
pub trait Filter: fmt::Display + Send + Sync {
    /// Bind definition arguments. Called once, before [`Filter::filter`].
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Filter>>>) -> Result<()>;

    fn filter(&self, targets: Vec<Target>) -> Vec<Target>;
}

impl Plugin for Box<dyn Filter> {
    fn bind(&mut self, args: Vec<Arg<Self>>) -> Result<()> {
        self.as_mut().set_args(args)
    }
}

/// Build the filter registry. `lookup` serves `ec2-instance-id`.
pub fn registry(lookup: Arc<dyn InstanceLookup>) -> Registry<Box<dyn Filter>> {
    Registry::new(Family::Filter)
        .register(ID, || -> Box<dyn Filter> { Box::new(Id) })
        .register(LIST, || -> Box<dyn Filter> { Box::new(List::default()) })
        .register(FIRST, || -> Box<dyn Filter> { Box::new(First) })
        .register(EC2_INSTANCE_ID, move || -> Box<dyn Filter> {
            Box::new(Ec2InstanceId {
                region: String::new(),
                lookup: lookup.clone(),
            })
        })
}

struct Id;

impl Filter for Id {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Filter>>>) -> Result<()> {
        require_no_arguments(ID, &args)
    }

    fn filter(&self, targets: Vec<Target>) -> Vec<Target> {
        targets
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", ID)
    }
}

#[derive(Default)]
struct List {
    children: Vec<Box<dyn Filter>>,
}

impl Filter for List {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Filter>>>) -> Result<()> {
        self.children = children(LIST, args)?;
        Ok(())
    }

    fn filter(&self, targets: Vec<Target>) -> Vec<Target> {
        self.children.iter().fold(targets, |targets, child| {
            let targets = child.filter(targets);
            tracing::debug!("Targets after filter {}: {}", child, target::describe(&targets));
            targets
        })
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", LIST)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ">")
    }
}

/// Drops the first target.
///
/// Despite the name, this removes the first target rather than selecting it.
struct First;

impl Filter for First {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Filter>>>) -> Result<()> {
        require_no_arguments(FIRST, &args)
    }

    fn filter(&self, mut targets: Vec<Target>) -> Vec<Target> {
        if !targets.is_empty() {
            targets.remove(0);
        }
        targets
    }
}

impl fmt::Display for First {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", FIRST)
    }
}

struct Ec2InstanceId {
    region: String,
    lookup: Arc<dyn InstanceLookup>,
}

impl Filter for Ec2InstanceId {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Filter>>>) -> Result<()> {
        self.region = literal(EC2_INSTANCE_ID, single(EC2_INSTANCE_ID, args)?)?;
        Ok(())
    }

    fn filter(&self, targets: Vec<Target>) -> Vec<Target> {
        targets
            .into_iter()
            .map(|mut t| {
                let Some(instance_id) = ec2::find_instance_id(&t.host) else {
                    tracing::debug!(
                        "Target {} has no EC2 instance id, skipping lookup in {}",
                        t,
                        self.region
                    );
                    return t;
                };

                match self.lookup.public_address(&self.region, instance_id) {
                    Ok(Some(address)) => {
                        tracing::debug!("Resolved {} ({}) to {}", t.host, instance_id, address);
                        t.host = address;
                    }
                    Ok(None) => {
                        tracing::warn!(
                            "EC2 instance lookup failed for {} ({}) in region {}",
                            t.host,
                            instance_id,
                            self.region
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            "EC2 instance lookup failed for {} ({}) in region {}: {}",
                            t.host,
                            instance_id,
                            self.region,
                            err
                        );
                    }
                }
                t
            })
            .collect()
    }
}

impl fmt::Display for Ec2InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", EC2_INSTANCE_ID, self.region)
    }
}
