//! The OpenResty resource set
//!
//! Declares, in order: the service group and user, the download and build
//! packages, the four build steps (download, untar, configure, install) and
//! the nginx service. Declaration order is also the tie-break order of the
//! plan.

use declarative::{Declaration, ResourceKey};

use crate::host::Host;
use crate::resource::{Exec, Group, Package, Service, User};
use crate::schema::ProvisionConfig;

pub const GROUP: &str = "openresty group";
pub const USER: &str = "openresty user";
pub const DOWNLOAD: &str = "download openresty";
pub const UNTAR: &str = "untar openresty";
pub const CONFIGURE: &str = "configure openresty";
pub const INSTALL: &str = "install openresty";

/// Build the declarations for `config`, every resource bound to `host`
pub fn openresty(config: &ProvisionConfig, host: &Host) -> Vec<Declaration> {
    let build_dir = config.build_dir.clone();
    let source_dir = config.source_dir();
    let path = config.search_path.as_str();

    let mut decls = vec![
        Declaration::new(Group::new(GROUP, &config.group, host)),
        Declaration::new(
            User::new(USER, &config.user, host)
                .groups([config.group.as_str()])
                .comment(&config.user_comment)
                .shell(&config.user_shell)
                .system(true),
        )
        .require(ResourceKey::group(GROUP)),
    ];

    let package = |name: &str| {
        let pkg = Package::new(name, host);
        match config.package_version(name) {
            Some(version) => pkg.with_version(version),
            None => pkg,
        }
    };
    decls.push(Declaration::new(package(&config.download_package)));
    decls.extend(
        config
            .build_packages
            .iter()
            .map(|name| Declaration::new(package(name))),
    );

    decls.push(
        Declaration::new(
            Exec::new(DOWNLOAD, &format!("wget {}", config.tarball_url()), host)
                .cwd(&build_dir)
                .path(path)
                .creates(config.tarball_path()),
        )
        .require(ResourceKey::package(&config.download_package))
        .notify(ResourceKey::exec(UNTAR)),
    );

    decls.push(
        Declaration::new(
            Exec::new(UNTAR, &format!("tar -zxvf {}", config.tarball_name()), host)
                .cwd(&build_dir)
                .path(path)
                .creates(source_dir.join("configure")),
        )
        .notify(ResourceKey::exec(CONFIGURE)),
    );

    let configure = format!(
        "{} --user={} --group={}",
        source_dir.join("configure").display(),
        config.user,
        config.group
    );
    decls.push(
        Declaration::new(
            Exec::new(CONFIGURE, &configure, host)
                .cwd(&source_dir)
                .path(path)
                .creates(source_dir.join("build")),
        )
        .require_all(config.build_packages.iter().map(ResourceKey::package))
        .notify(ResourceKey::exec(INSTALL)),
    );

    decls.push(
        Declaration::new(
            Exec::new(INSTALL, "make && make install", host)
                .cwd(&source_dir)
                .path(path)
                .creates(config.nginx_binary()),
        )
        .require(ResourceKey::user(USER))
        .require(ResourceKey::exec(CONFIGURE)),
    );

    decls.push(
        Declaration::new(
            Service::new(&config.service_name, host)
                .enable(true)
                .hasrestart(false)
                .restart_command(&config.restart_command()),
        )
        .require(ResourceKey::exec(INSTALL)),
    );

    decls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ServiceStatus;
    use crate::host::simulated::SimulatedHost;
    use declarative::{
        Attributes, Change, ExecuteOptions, Outcome, ResourceGraph, converge_simple,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const TARBALL: &str = "/tmp/ngx_openresty-1.7.0.1.tar.gz";
    const CONFIGURE_SCRIPT: &str = "/tmp/ngx_openresty-1.7.0.1/configure";
    const BUILD_DIR: &str = "/tmp/ngx_openresty-1.7.0.1/build";
    const NGINX: &str = "/usr/local/openresty/nginx/sbin/nginx";

    fn graph(config: &ProvisionConfig, host: &Host) -> ResourceGraph {
        ResourceGraph::build(openresty(config, host)).unwrap()
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>()
    }

    /// A host where every build step produces its guard path
    fn fresh_host(config: &ProvisionConfig) -> Arc<SimulatedHost> {
        let sim = SimulatedHost::new();
        sim.on_command(&format!("wget {}", config.tarball_url()), config.tarball_path())
            .on_command(
                &format!("tar -zxvf {}", config.tarball_name()),
                config.source_dir().join("configure"),
            )
            .on_command(
                &format!(
                    "{} --user={} --group={}",
                    config.source_dir().join("configure").display(),
                    config.user,
                    config.group
                ),
                config.source_dir().join("build"),
            )
            .on_command("make && make install", config.nginx_binary());
        sim
    }

    /// A host with everything in place except the installed binary
    fn built_host(config: &ProvisionConfig) -> Arc<SimulatedHost> {
        let sim = fresh_host(config);
        for pkg in ["wget", "perl", "gcc", "readline-devel", "pcre-devel", "openssl-devel"] {
            sim.with_package(pkg);
        }
        sim.with_group(&config.group)
            .with_user(crate::host::UserSpec {
                name: config.user.clone(),
                groups: vec![config.group.clone()],
                comment: Some(config.user_comment.clone()),
                shell: Some(config.user_shell.clone()),
                system: true,
            })
            .with_path(TARBALL)
            .with_path(CONFIGURE_SCRIPT)
            .with_path(BUILD_DIR)
            .with_service(
                "nginx",
                ServiceStatus {
                    running: true,
                    enabled: true,
                },
            );
        sim
    }

    /// A host with everything already in place
    fn installed_host(config: &ProvisionConfig) -> Arc<SimulatedHost> {
        let sim = built_host(config);
        sim.with_path(NGINX);
        sim
    }

    #[test]
    fn test_default_attributes() {
        let config = ProvisionConfig::default();
        let sim = SimulatedHost::new();
        let g = graph(&config, &sim.host());

        let attributes = |key: ResourceKey| g.get(&key).unwrap().attributes();

        assert_eq!(
            attributes(ResourceKey::group(GROUP)),
            attrs(&[("ensure", "present"), ("name", "nginx")])
        );
        assert_eq!(
            attributes(ResourceKey::user(USER)),
            attrs(&[
                ("comment", "nginx web server"),
                ("ensure", "present"),
                ("groups", "nginx"),
                ("name", "nginx"),
                ("shell", "/sbin/nologin"),
                ("system", "true"),
            ])
        );
        assert_eq!(
            attributes(ResourceKey::exec(DOWNLOAD)),
            attrs(&[
                (
                    "command",
                    "wget http://openresty.org/download/ngx_openresty-1.7.0.1.tar.gz"
                ),
                ("creates", TARBALL),
                ("cwd", "/tmp"),
                ("path", "/sbin:/bin:/usr/bin"),
            ])
        );
        assert_eq!(
            attributes(ResourceKey::exec(UNTAR)),
            attrs(&[
                ("command", "tar -zxvf ngx_openresty-1.7.0.1.tar.gz"),
                ("creates", CONFIGURE_SCRIPT),
                ("cwd", "/tmp"),
                ("path", "/sbin:/bin:/usr/bin"),
            ])
        );
        assert_eq!(
            attributes(ResourceKey::exec(CONFIGURE)),
            attrs(&[
                (
                    "command",
                    "/tmp/ngx_openresty-1.7.0.1/configure --user=nginx --group=nginx"
                ),
                ("creates", BUILD_DIR),
                ("cwd", "/tmp/ngx_openresty-1.7.0.1"),
                ("path", "/sbin:/bin:/usr/bin"),
            ])
        );
        assert_eq!(
            attributes(ResourceKey::exec(INSTALL)),
            attrs(&[
                ("command", "make && make install"),
                ("creates", NGINX),
                ("cwd", "/tmp/ngx_openresty-1.7.0.1"),
                ("path", "/sbin:/bin:/usr/bin"),
            ])
        );
        assert_eq!(
            attributes(ResourceKey::service("nginx")),
            attrs(&[
                ("enable", "true"),
                ("ensure", "running"),
                ("hasrestart", "false"),
                ("restart", "/etc/init.d/nginx reload"),
            ])
        );
        for pkg in ["wget", "perl", "gcc", "readline-devel", "pcre-devel", "openssl-devel"] {
            assert_eq!(
                attributes(ResourceKey::package(pkg)),
                attrs(&[("ensure", "present")])
            );
        }
    }

    #[test]
    fn test_default_edges() {
        let config = ProvisionConfig::default();
        let sim = SimulatedHost::new();
        let g = graph(&config, &sim.host());

        assert_eq!(
            g.requires_of(&ResourceKey::user(USER)),
            vec![ResourceKey::group(GROUP)]
        );
        assert_eq!(
            g.requires_of(&ResourceKey::exec(DOWNLOAD)),
            vec![ResourceKey::package("wget")]
        );
        assert_eq!(
            g.notifies_of(&ResourceKey::exec(DOWNLOAD)),
            vec![ResourceKey::exec(UNTAR)]
        );
        assert!(g.requires_of(&ResourceKey::exec(UNTAR)).is_empty());
        assert_eq!(
            g.notifies_of(&ResourceKey::exec(UNTAR)),
            vec![ResourceKey::exec(CONFIGURE)]
        );
        assert_eq!(
            g.requires_of(&ResourceKey::exec(CONFIGURE)),
            ["perl", "gcc", "readline-devel", "pcre-devel", "openssl-devel"]
                .map(ResourceKey::package)
                .to_vec()
        );
        assert_eq!(
            g.notifies_of(&ResourceKey::exec(CONFIGURE)),
            vec![ResourceKey::exec(INSTALL)]
        );
        assert_eq!(
            g.requires_of(&ResourceKey::exec(INSTALL)),
            vec![ResourceKey::user(USER), ResourceKey::exec(CONFIGURE)]
        );
        assert_eq!(
            g.requires_of(&ResourceKey::service("nginx")),
            vec![ResourceKey::exec(INSTALL)]
        );
        assert!(g.notifies_of(&ResourceKey::service("nginx")).is_empty());
    }

    #[test]
    fn test_user_and_group_parameters_flow_through() {
        let config = ProvisionConfig::default()
            .with_overrides(Some("openresty"), Some("openresty"))
            .unwrap();
        let sim = SimulatedHost::new();
        let g = graph(&config, &sim.host());

        let group = g.get(&ResourceKey::group(GROUP)).unwrap().attributes();
        assert_eq!(group["name"], "openresty");

        let user = g.get(&ResourceKey::user(USER)).unwrap().attributes();
        assert_eq!(user["name"], "openresty");
        assert_eq!(user["groups"], "openresty");
        assert_eq!(user["comment"], "nginx web server");

        let configure = g.get(&ResourceKey::exec(CONFIGURE)).unwrap().attributes();
        assert_eq!(
            configure["command"],
            "/tmp/ngx_openresty-1.7.0.1/configure --user=openresty --group=openresty"
        );
        assert_eq!(configure["creates"], BUILD_DIR);
    }

    #[test]
    fn test_package_version_pins() {
        let config = ProvisionConfig::parse("[package_versions]\ngcc = \"4.8.5\"\n").unwrap();
        let sim = SimulatedHost::new();
        let g = graph(&config, &sim.host());

        assert_eq!(
            g.get(&ResourceKey::package("gcc")).unwrap().attributes(),
            attrs(&[("ensure", "present"), ("version", "4.8.5")])
        );
        assert_eq!(
            g.get(&ResourceKey::package("perl")).unwrap().attributes(),
            attrs(&[("ensure", "present")])
        );
    }

    #[test]
    fn test_plan_order() {
        let config = ProvisionConfig::default();
        let sim = SimulatedHost::new();
        let plan: Vec<String> = graph(&config, &sim.host())
            .plan()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            plan,
            vec![
                "Group[openresty group]",
                "User[openresty user]",
                "Package[wget]",
                "Package[perl]",
                "Package[gcc]",
                "Package[readline-devel]",
                "Package[pcre-devel]",
                "Package[openssl-devel]",
                "Exec[download openresty]",
                "Exec[untar openresty]",
                "Exec[configure openresty]",
                "Exec[install openresty]",
                "Service[nginx]",
            ]
        );
    }

    #[test]
    fn test_fresh_host_applies_everything_then_converges() {
        let config = ProvisionConfig::default();
        let sim = fresh_host(&config);
        let g = graph(&config, &sim.host());

        let first = converge_simple(&g, &ExecuteOptions::default()).unwrap();
        assert!(first.is_success(), "{:?}", first.failures());
        assert_eq!(first.summary().applied, 13);
        assert!(first.entries.iter().all(|e| e.outcome.is_change()));

        // Untar was notified by download, and so on down the chain
        let untar = &first.entries[9];
        assert_eq!(untar.notified_by, vec![ResourceKey::exec(DOWNLOAD)]);

        assert!(sim.has_path(std::path::Path::new(NGINX)));
        assert_eq!(
            sim.service("nginx"),
            ServiceStatus {
                running: true,
                enabled: true
            }
        );
        assert_eq!(
            &sim.calls()[..3],
            &["groupadd nginx", "useradd nginx", "install wget"]
        );

        sim.clear_calls();
        let second = converge_simple(&g, &ExecuteOptions::default()).unwrap();
        assert_eq!(second.summary().applied, 0);
        assert_eq!(second.summary().unchanged, 13);
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_installed_host_is_unchanged() {
        let config = ProvisionConfig::default();
        let sim = installed_host(&config);
        let report = converge_simple(&graph(&config, &sim.host()), &ExecuteOptions::default())
            .unwrap();

        assert!(report.entries.iter().all(|e| e.outcome == Outcome::Unchanged));
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let config = ProvisionConfig::default();
        let sim = fresh_host(&config);
        let options = ExecuteOptions {
            jobs: 4,
            ..ExecuteOptions::default()
        };
        let report = converge_simple(&graph(&config, &sim.host()), &options).unwrap();

        let order: Vec<ResourceKey> = report.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(order, graph(&config, &sim.host()).plan());
        assert_eq!(report.summary().applied, 13);
    }

    #[test]
    fn test_failed_configure_blocks_install_and_service() {
        let config = ProvisionConfig::default();
        let sim = fresh_host(&config);
        sim.fail_command("/tmp/ngx_openresty-1.7.0.1/configure --user=nginx --group=nginx");

        let report = converge_simple(&graph(&config, &sim.host()), &ExecuteOptions::default())
            .unwrap();

        assert!(matches!(
            report.outcome(&ResourceKey::exec(CONFIGURE)),
            Some(Outcome::Failed { .. })
        ));
        assert_eq!(
            report.outcome(&ResourceKey::exec(INSTALL)),
            Some(&Outcome::Blocked {
                by: ResourceKey::exec(CONFIGURE)
            })
        );
        assert_eq!(
            report.outcome(&ResourceKey::service("nginx")),
            Some(&Outcome::Blocked {
                by: ResourceKey::exec(CONFIGURE)
            })
        );
        // Unrelated branches still converged
        assert!(report.outcome(&ResourceKey::user(USER)).unwrap().is_change());
        assert!(
            report
                .outcome(&ResourceKey::package("openssl-devel"))
                .unwrap()
                .is_change()
        );
        assert!(!sim.calls().contains(&"run make && make install".to_string()));

        let summary = report.summary();
        assert_eq!((summary.failed, summary.blocked), (1, 2));
    }

    #[test]
    fn test_notified_service_reloads_instead_of_restarting() {
        let config = ProvisionConfig::default();
        let sim = built_host(&config);

        let mut decls = openresty(&config, &sim.host());
        let install = decls
            .iter()
            .position(|d| d.key() == ResourceKey::exec(INSTALL))
            .unwrap();
        let decl = decls.remove(install).notify(ResourceKey::service("nginx"));
        decls.insert(install, decl);
        let g = ResourceGraph::build(decls).unwrap();

        let report = converge_simple(&g, &ExecuteOptions::default()).unwrap();
        assert_eq!(
            report.outcome(&ResourceKey::service("nginx")),
            Some(&Outcome::Applied {
                change: Change::Refreshed
            })
        );
        assert_eq!(
            sim.calls(),
            vec!["run make && make install", "run /etc/init.d/nginx reload"]
        );
    }

    #[test]
    fn test_probe_outage_applies_everything() {
        let config = ProvisionConfig::default();
        let sim = installed_host(&config);
        sim.probe_outage(true);
        sim.clear_calls();

        let report = converge_simple(&graph(&config, &sim.host()), &ExecuteOptions::default())
            .unwrap();
        // Group creation collides with the existing group and blocks the user
        // branch; everything else applies blindly
        assert!(report.outcome(&ResourceKey::package("wget")).unwrap().is_change());
        assert!(
            report
                .outcome(&ResourceKey::exec(DOWNLOAD))
                .unwrap()
                .is_change()
        );
        assert!(sim.calls().contains(&"install wget".to_string()));
    }
}
