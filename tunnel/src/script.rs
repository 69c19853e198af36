use platform::JobConnectionInfo;

use crate::forward::LocalForward;

/// Renders the script that keeps the tunnel open while it runs in the
/// foreground on job1.
///
/// `key_path` is left unquoted so a leading `~/` is expanded by the shell.
pub fn render_tunnel_script(
    job2: &JobConnectionInfo,
    forward: &LocalForward,
    key_path: &str,
) -> String {
    format!(
        "#!/bin/bash\nssh -p {port} -i {key_path} {user}@{host} -L {forward} -N -v\n",
        port = job2.ssh_port,
        user = job2.user,
        host = job2.host,
    )
}
