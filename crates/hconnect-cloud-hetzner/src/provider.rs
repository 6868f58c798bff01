//! Hetzner Cloud implementation of the cloud API

use async_trait::async_trait;
use hconnect_cloud::{
    Action, ActionWatch, CloudApi, Firewall, FirewallRule, LoadBalancer, Server,
};

use crate::client::HetznerClient;
use crate::schema::{
    ActionResponse, ActionsResponse, AddTargetRequest, ApplyToResourcesRequest,
    FirewallsResponse, LoadBalancerResponse, LoadBalancersResponse, RemoveFromResourcesRequest,
    RemoveTargetRequest, ServerResource, ServersResponse, SetRulesRequest,
};

const PER_PAGE: u32 = 50;

#[async_trait]
impl CloudApi for HetznerClient {
    fn name(&self) -> &str {
        "hetzner"
    }

    async fn server_by_name(&self, name: &str) -> hconnect_cloud::Result<Option<Server>> {
        let response: ServersResponse = self
            .get("/servers", &[("name", name.to_string())])
            .await?;

        match response.servers.into_iter().next() {
            Some(server) => Ok(Some(Server::try_from(server)?)),
            None => Ok(None),
        }
    }

    async fn all_firewalls(&self) -> hconnect_cloud::Result<Vec<Firewall>> {
        let mut firewalls = Vec::new();
        let mut page = 1;

        loop {
            let response: FirewallsResponse = self
                .get(
                    "/firewalls",
                    &[
                        ("page", page.to_string()),
                        ("per_page", PER_PAGE.to_string()),
                    ],
                )
                .await?;

            firewalls.extend(response.firewalls.into_iter().map(Firewall::from));

            match response.meta.and_then(|m| m.pagination.next_page) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        tracing::debug!(count = firewalls.len(), "fetched firewall catalog");
        Ok(firewalls)
    }

    async fn load_balancer_by_id(&self, id: u64) -> hconnect_cloud::Result<Option<LoadBalancer>> {
        match self
            .get::<LoadBalancerResponse>(&format!("/load_balancers/{id}"), &[])
            .await
        {
            Ok(response) => Ok(Some(response.load_balancer.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_balancer_by_name(
        &self,
        name: &str,
    ) -> hconnect_cloud::Result<Option<LoadBalancer>> {
        let response: LoadBalancersResponse = self
            .get("/load_balancers", &[("name", name.to_string())])
            .await?;
        Ok(response.load_balancers.into_iter().next().map(Into::into))
    }

    async fn apply_firewall_to_server(
        &self,
        firewall_id: u64,
        server_id: u64,
    ) -> hconnect_cloud::Result<Vec<Action>> {
        let response: ActionsResponse = self
            .post(
                &format!("/firewalls/{firewall_id}/actions/apply_to_resources"),
                &ApplyToResourcesRequest {
                    apply_to: vec![ServerResource::new(server_id)],
                },
            )
            .await?;
        Ok(response.actions)
    }

    async fn remove_firewall_from_server(
        &self,
        firewall_id: u64,
        server_id: u64,
    ) -> hconnect_cloud::Result<Vec<Action>> {
        let response: ActionsResponse = self
            .post(
                &format!("/firewalls/{firewall_id}/actions/remove_from_resources"),
                &RemoveFromResourcesRequest {
                    remove_from: vec![ServerResource::new(server_id)],
                },
            )
            .await?;
        Ok(response.actions)
    }

    async fn set_firewall_rules(
        &self,
        firewall_id: u64,
        rules: Vec<FirewallRule>,
    ) -> hconnect_cloud::Result<Vec<Action>> {
        let response: ActionsResponse = self
            .post(
                &format!("/firewalls/{firewall_id}/actions/set_rules"),
                &SetRulesRequest { rules },
            )
            .await?;
        Ok(response.actions)
    }

    async fn add_server_target(
        &self,
        load_balancer_id: u64,
        server_id: u64,
        use_private_ip: bool,
    ) -> hconnect_cloud::Result<Action> {
        let response: ActionResponse = self
            .post(
                &format!("/load_balancers/{load_balancer_id}/actions/add_target"),
                &AddTargetRequest {
                    target: ServerResource::new(server_id),
                    use_private_ip,
                },
            )
            .await?;
        Ok(response.action)
    }

    async fn remove_server_target(
        &self,
        load_balancer_id: u64,
        server_id: u64,
    ) -> hconnect_cloud::Result<Action> {
        let response: ActionResponse = self
            .post(
                &format!("/load_balancers/{load_balancer_id}/actions/remove_target"),
                &RemoveTargetRequest {
                    target: ServerResource::new(server_id),
                },
            )
            .await?;
        Ok(response.action)
    }

    fn watch_action(&self, action: &Action) -> ActionWatch {
        let (reporter, watch) = ActionWatch::channel(action.id);
        let client = self.clone();
        let id = action.id;
        tokio::spawn(async move { client.track_action(id, reporter).await });
        watch
    }
}
