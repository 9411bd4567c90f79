//! `docker run` argument and environment composition for container-backed
//! servers.

use super::{ClientPoolError, TemplateRenderer};
use crate::client_pool::domain::{
    ContainerLaunch, PoolOptions, ProcessLaunch, ServerDescriptor, ToolContainer, expand_vars,
    lookup_entry,
};
use crate::sandbox::domain::TargetConfig;
use tracing::warn;

const ENGINE_PROGRAM: &str = "docker";
const UNKNOWN_SECRET: &str = "<UNKNOWN>";
const READ_ONLY_SUFFIX: &str = ":ro";

/// The complete command line and environment for one backend container.
///
/// Secret and environment values travel in the process environment; the
/// command line only names the variables (`-e NAME`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLaunchPlan {
    args: Vec<String>,
    env: Vec<String>,
}

impl ContainerLaunchPlan {
    /// Returns the flags every backend container is started with.
    #[must_use]
    pub fn base_args(server: &str, options: &PoolOptions) -> Vec<String> {
        let mut args = owned(&[
            "run",
            "--rm",
            "-i",
            "--init",
            "--security-opt",
            "no-new-privileges",
        ]);
        if options.cpus > 0 {
            args.extend(["--cpus".to_owned(), options.cpus.to_string()]);
        }
        if let Some(memory) = options.memory.as_deref().filter(|value| !value.is_empty()) {
            args.extend(["--memory".to_owned(), memory.to_owned()]);
        }
        args.extend(owned(&["--pull", "never"]));
        if options.in_dind {
            args.push("--privileged".to_owned());
        }
        args.extend([
            "-l".to_owned(),
            "toolgate=true".to_owned(),
            "-l".to_owned(),
            "toolgate-tool-type=mcp".to_owned(),
            "-l".to_owned(),
            format!("toolgate-name={server}"),
            "-l".to_owned(),
            "toolgate-transport=stdio".to_owned(),
        ]);
        args
    }

    /// Composes the run arguments for `launch`.
    ///
    /// `networks` are the networks shared with the gateway; `target` carries
    /// the sandbox attachment, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolError::Template`] when a templated value cannot
    /// be evaluated.
    pub fn compose(
        descriptor: &ServerDescriptor,
        launch: &ContainerLaunch,
        options: &PoolOptions,
        networks: &[String],
        target: &TargetConfig,
        read_only: bool,
        renderer: &TemplateRenderer,
    ) -> Result<Self, ClientPoolError> {
        let mut plan = Self {
            args: Self::base_args(descriptor.name().as_str(), options),
            env: Vec::new(),
        };
        plan.attach_networks(launch, networks, target);
        plan.inject_secrets(descriptor);
        plan.inject_env(descriptor, renderer)?;
        plan.mount_volumes(descriptor, launch, read_only, renderer)?;
        plan.set_user(descriptor, launch, renderer)?;

        plan.args.push(launch.image().to_owned());
        let command = renderer
            .render_list(launch.command(), descriptor.config())
            .map_err(|err| template_error(descriptor, &launch.command().join(" "), &err))?;
        let expanded: Vec<String> = command
            .iter()
            .map(|argument| expand_vars(argument, |name| lookup_entry(&plan.env, name)))
            .collect();
        plan.args.extend(expanded);
        Ok(plan)
    }

    /// Composes the run arguments for a one-shot tool container.
    ///
    /// The container joins the gateway networks. Volumes and the command
    /// are rendered against the call `arguments`; empty mounts are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolError::Template`] when a templated value cannot
    /// be evaluated.
    pub fn compose_tool(
        tool: &ToolContainer,
        options: &PoolOptions,
        networks: &[String],
        arguments: &serde_json::Value,
        renderer: &TemplateRenderer,
    ) -> Result<Self, ClientPoolError> {
        let launch = tool.launch();
        let failed = |template: &[String], err: &minijinja::Error| ClientPoolError::Template {
            server: tool.name().clone(),
            template: template.join(" "),
            reason: err.to_string(),
        };

        let mut args = Self::base_args(tool.name().as_str(), options);
        for network in networks {
            args.extend(["--network".to_owned(), network.clone()]);
        }
        let mounts = renderer
            .render_list(launch.volumes(), arguments)
            .map_err(|err| failed(launch.volumes(), &err))?;
        for mount in mounts.into_iter().filter(|mount| !mount.is_empty()) {
            args.extend(["-v".to_owned(), mount]);
        }
        args.push(launch.image().to_owned());
        args.extend(
            renderer
                .render_list(launch.command(), arguments)
                .map_err(|err| failed(launch.command(), &err))?,
        );
        Ok(Self {
            args,
            env: Vec::new(),
        })
    }

    fn attach_networks(&mut self, launch: &ContainerLaunch, networks: &[String], target: &TargetConfig) {
        if launch.disable_network() {
            self.args.extend(owned(&["--network", "none"]));
        } else {
            for network in networks {
                self.args.extend(["--network".to_owned(), network.clone()]);
            }
        }
        if let Some(network) = target.network_name() {
            self.args.extend(["--network".to_owned(), network.to_owned()]);
        }
        for link in target.links() {
            self.args.extend(["--link".to_owned(), link.to_string()]);
        }
        for entry in target.env() {
            self.args.extend(["-e".to_owned(), entry.clone()]);
        }
        if let Some(dns) = target.dns() {
            self.args.extend(["--dns".to_owned(), dns.to_string()]);
        }
    }

    fn inject_secrets(&mut self, descriptor: &ServerDescriptor) {
        for binding in descriptor.secrets() {
            self.args.extend(["-e".to_owned(), binding.env.clone()]);
            let value = descriptor.secret_value(&binding.name).unwrap_or_else(|| {
                warn!(
                    server = %descriptor.name(),
                    secret = %binding.name,
                    env = %binding.env,
                    "secret not found, using placeholder"
                );
                UNKNOWN_SECRET
            });
            self.env.push(format!("{}={value}", binding.env));
        }
    }

    fn inject_env(
        &mut self,
        descriptor: &ServerDescriptor,
        renderer: &TemplateRenderer,
    ) -> Result<(), ClientPoolError> {
        for binding in descriptor.env() {
            let value = if TemplateRenderer::is_template(&binding.value) {
                renderer
                    .render(&binding.value, descriptor.config())
                    .map_err(|err| template_error(descriptor, &binding.value, &err))?
            } else {
                expand_vars(&binding.value, |name| lookup_entry(&self.env, name))
            };
            if !value.is_empty() {
                self.args.extend(["-e".to_owned(), binding.name.clone()]);
                self.env.push(format!("{}={value}", binding.name));
            }
        }
        Ok(())
    }

    fn mount_volumes(
        &mut self,
        descriptor: &ServerDescriptor,
        launch: &ContainerLaunch,
        read_only: bool,
        renderer: &TemplateRenderer,
    ) -> Result<(), ClientPoolError> {
        let mounts = renderer
            .render_list(launch.volumes(), descriptor.config())
            .map_err(|err| template_error(descriptor, &launch.volumes().join(" "), &err))?;
        for mount in mounts.into_iter().filter(|mount| !mount.is_empty()) {
            let volume = if read_only && !mount.ends_with(READ_ONLY_SUFFIX) {
                format!("{mount}{READ_ONLY_SUFFIX}")
            } else {
                mount
            };
            self.args.extend(["-v".to_owned(), volume]);
        }
        Ok(())
    }

    fn set_user(
        &mut self,
        descriptor: &ServerDescriptor,
        launch: &ContainerLaunch,
        renderer: &TemplateRenderer,
    ) -> Result<(), ClientPoolError> {
        let Some(raw) = launch.user().filter(|user| !user.is_empty()) else {
            return Ok(());
        };
        let user = renderer
            .render(raw, descriptor.config())
            .map_err(|err| template_error(descriptor, raw, &err))?;
        if !user.is_empty() {
            self.args.extend(["-u".to_owned(), user]);
        }
        Ok(())
    }

    /// Returns the arguments following the engine binary.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the `NAME=value` environment of the engine process.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Turns the plan into the process the stdio client spawns.
    #[must_use]
    pub fn into_process(self) -> ProcessLaunch {
        ProcessLaunch {
            program: ENGINE_PROGRAM.to_owned(),
            args: self.args,
            env: self.env,
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_owned()).collect()
}

fn template_error(
    descriptor: &ServerDescriptor,
    template: &str,
    err: &minijinja::Error,
) -> ClientPoolError {
    ClientPoolError::Template {
        server: descriptor.name().clone(),
        template: template.to_owned(),
        reason: err.to_string(),
    }
}
