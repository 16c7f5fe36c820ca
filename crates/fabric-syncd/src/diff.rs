//! Diff engine: registry snapshot vs fabric snapshot.
//!
//! The addition pass and the deletion pass are computed independently from
//! the same two snapshots. Neither pass touches the fabric; both return
//! plain operation lists.
//!
//! # Stale CIDR resolution
//!
//! When a registry subnet's gateway CIDR is not bound on its segment but
//! some other CIDR is, that stale CIDR is rewritten in place (an update)
//! unless another registry subnet of the same project and network still
//! owns it, or an earlier update in the same pass already took it. Stale
//! entries are considered one at a time in fabric order; the first
//! unclaimed one wins. Otherwise the gateway is created.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::fabric_state::FabricSnapshot;
use crate::model::{NetworkOp, Subnet, SubnetOp, TenantInterfaceOp};
use crate::registry::RegistrySnapshot;

/// Operations that bring missing registry objects onto the fabric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionPlan {
    pub networks: Vec<NetworkOp>,
    /// Creates and updates, in registry order.
    pub subnets: Vec<SubnetOp>,
}

impl AdditionPlan {
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.subnets.is_empty()
    }
}

/// Fabric objects with no registry counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub subnets: Vec<SubnetOp>,
    pub networks: Vec<NetworkOp>,
    pub tenant_interfaces: Vec<TenantInterfaceOp>,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty() && self.networks.is_empty() && self.tenant_interfaces.is_empty()
    }
}

/// A registry subnet resolved onto fabric names.
struct ResolvedSubnet<'a> {
    subnet: &'a Subnet,
    tenant: String,
    segment: String,
    gateway_cidr: String,
}

/// The fabric segment a registry network maps to.
fn segment_name(network: &crate::model::Network) -> SyncResult<&str> {
    if network.name.is_empty() {
        return Err(SyncError::validation("network", &network.id, "name is empty"));
    }
    Ok(&network.name)
}

/// Computes fabric operations for one deployment.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    deployment_id: String,
}

impl DiffEngine {
    pub fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
        }
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Resolves every registry subnet that has a gateway.
    ///
    /// Fails on the first subnet whose project, network or CIDR cannot be
    /// mapped.
    fn resolve_subnets<'a>(
        &self,
        registry: &'a RegistrySnapshot,
    ) -> SyncResult<Vec<ResolvedSubnet<'a>>> {
        let mut resolved = Vec::new();
        for subnet in &registry.subnets {
            let Some(gateway_cidr) = subnet.gateway_cidr()? else {
                debug!(subnet = %subnet.id, "Skipping subnet without gateway");
                continue;
            };
            let tenant = registry.tenant_name(&subnet.tenant_id, &self.deployment_id)?;
            let network = registry.network(&subnet.network_id).ok_or_else(|| {
                SyncError::validation("network", &subnet.network_id, "not found")
            })?;
            resolved.push(ResolvedSubnet {
                subnet,
                tenant,
                segment: segment_name(network)?.to_string(),
                gateway_cidr,
            });
        }
        Ok(resolved)
    }

    /// Addition pass.
    pub fn additions(
        &self,
        registry: &RegistrySnapshot,
        fabric: &FabricSnapshot,
    ) -> SyncResult<AdditionPlan> {
        let mut plan = AdditionPlan::default();

        for network in &registry.networks {
            let tenant = registry.tenant_name(&network.tenant_id, &self.deployment_id)?;
            let segment = segment_name(network)?;
            if fabric.segment(&tenant, segment).is_none() {
                plan.networks.push(NetworkOp::new(tenant, segment));
            }
        }

        let resolved = self.resolve_subnets(registry)?;
        // (tenant, segment, stale cidr) already rewritten by this plan
        let mut taken: HashSet<(String, String, String)> = HashSet::new();

        for entry in &resolved {
            let bound: Vec<&str> = fabric
                .segment(&entry.tenant, &entry.segment)
                .map(|si| si.cidrs().collect())
                .unwrap_or_default();

            if bound.contains(&entry.gateway_cidr.as_str()) {
                continue;
            }

            let stale = bound.iter().find(|cidr| {
                let key = (
                    entry.tenant.clone(),
                    entry.segment.clone(),
                    cidr.to_string(),
                );
                !taken.contains(&key) && !Self::claimed_by_sibling(&resolved, entry, cidr)
            });

            match stale {
                Some(original) => {
                    taken.insert((
                        entry.tenant.clone(),
                        entry.segment.clone(),
                        original.to_string(),
                    ));
                    plan.subnets.push(SubnetOp::update(
                        entry.tenant.clone(),
                        entry.segment.clone(),
                        *original,
                        entry.gateway_cidr.clone(),
                    ));
                }
                None => plan.subnets.push(SubnetOp::new(
                    entry.tenant.clone(),
                    entry.segment.clone(),
                    entry.gateway_cidr.clone(),
                )),
            }
        }

        Ok(plan)
    }

    /// Returns true if another subnet of the same project and network has
    /// `cidr` as its gateway CIDR.
    fn claimed_by_sibling(resolved: &[ResolvedSubnet<'_>], entry: &ResolvedSubnet<'_>, cidr: &str) -> bool {
        resolved.iter().any(|other| {
            other.subnet.id != entry.subnet.id
                && other.subnet.tenant_id == entry.subnet.tenant_id
                && other.subnet.network_id == entry.subnet.network_id
                && other.gateway_cidr == cidr
        })
    }

    /// Deletion pass.
    ///
    /// `superseded` lists updates applied in the same pass; their original
    /// CIDRs have already been rewritten and are not deletion candidates.
    pub fn deletions(
        &self,
        registry: &RegistrySnapshot,
        fabric: &FabricSnapshot,
        superseded: &[SubnetOp],
    ) -> SyncResult<DeletionPlan> {
        let mut networks: HashSet<(String, &str)> = HashSet::new();
        for network in &registry.networks {
            let tenant = registry.tenant_name(&network.tenant_id, &self.deployment_id)?;
            networks.insert((tenant, network.name.as_str()));
        }

        let excluded: HashSet<(String, &str)> = registry
            .excluded_networks
            .iter()
            .filter_map(|n| {
                registry
                    .find_tenant_name(&n.tenant_id, &self.deployment_id)
                    .map(|tenant| (tenant, n.name.as_str()))
            })
            .collect();

        let gateways: HashSet<(String, String, String)> = self
            .resolve_subnets(registry)?
            .into_iter()
            .map(|r| (r.tenant, r.segment, r.gateway_cidr))
            .collect();

        let rewritten: HashSet<(&str, &str, &str)> = superseded
            .iter()
            .filter_map(|op| {
                op.original_gateway_ip.as_deref().map(|original| {
                    (
                        op.project_name.as_str(),
                        op.segment_name.as_str(),
                        original,
                    )
                })
            })
            .collect();

        let mut plan = DeletionPlan::default();
        for (tenant, segments) in fabric.formed_tenants() {
            for si in segments {
                if excluded.contains(&(tenant.name.clone(), si.segment.as_str())) {
                    debug!(tenant = %tenant.name, segment = %si.segment, "Skipping excluded segment");
                    continue;
                }

                for cidr in si.cidrs() {
                    if rewritten.contains(&(tenant.name.as_str(), si.segment.as_str(), cidr)) {
                        continue;
                    }
                    let key = (tenant.name.clone(), si.segment.clone(), cidr.to_string());
                    if !gateways.contains(&key) {
                        plan.subnets.push(SubnetOp::new(
                            tenant.name.clone(),
                            si.segment.clone(),
                            cidr,
                        ));
                    }
                }

                if !networks.contains(&(tenant.name.clone(), si.segment.as_str())) {
                    plan.networks
                        .push(NetworkOp::new(tenant.name.clone(), si.segment.clone()));
                }
            }
        }

        Ok(plan)
    }

    /// `system` tenant interfaces whose remote tenant exists neither in the
    /// registry nor on the fabric.
    pub fn orphan_tenant_interfaces(
        &self,
        registry: &RegistrySnapshot,
        fabric: &FabricSnapshot,
    ) -> Vec<TenantInterfaceOp> {
        fabric
            .system_tenant_interfaces
            .iter()
            .filter(|ti| !registry.has_tenant(&ti.remote_tenant, &self.deployment_id))
            .filter(|ti| {
                let on_fabric = fabric.tenant(&ti.remote_tenant).is_some();
                if on_fabric {
                    debug!(
                        tenant = %ti.remote_tenant,
                        "Tenant still exists on the fabric, keeping system tenant interface"
                    );
                }
                !on_fabric
            })
            .map(|ti| TenantInterfaceOp::new(ti.remote_tenant.clone()))
            .collect()
    }
}
