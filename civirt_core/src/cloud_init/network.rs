use ipnet::Ipv4Net;
use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

// Error handling
use civirt_error::{CivirtError, LibError};
use miette::Result;

pub const PREFIX_LEN: u8 = 24;
pub const INTERFACE: &str = "interface0";
pub const GUEST_IFACE: &str = "eth0";

/*
* Cloud-init network config, version 2 (netplan like).
* One ethernet interface matched by the mac address libvirt allocated.
*/
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct NetworkConfig {
    pub version: u8,
    pub ethernets: BTreeMap<String, Ethernet>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct Ethernet {
    #[serde(rename = "match")]
    pub matches: MacMatch,
    #[serde(rename = "set-name")]
    pub set_name: String,
    pub addresses: Vec<String>,
    pub gateway4: Ipv4Addr,
    pub nameservers: Nameservers,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct MacMatch {
    pub macaddress: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct Nameservers {
    pub addresses: Vec<Ipv4Addr>,
}

impl NetworkConfig {
    /// The gateway and the nameserver are both the first host of the subnet.
    pub fn new(mac: &MacAddr6, address: Ipv4Addr) -> Result<Self, CivirtError> {
        let net = Ipv4Net::new(address, PREFIX_LEN).map_err(|e| {
            LibError::builder()
                .msg(&format!("Couldn't derive a subnet from {address}"))
                .help(&e.to_string())
                .build()
        })?;
        let gateway = match net.hosts().next() {
            Some(v) => v,
            None => {
                let message = format!("Subnet {} has no host address", net.trunc());
                return Err(LibError::builder().msg(&message).help("").build().into());
            }
        };

        let ethernet = Ethernet {
            matches: MacMatch {
                macaddress: mac.to_string().to_lowercase(),
            },
            set_name: GUEST_IFACE.to_owned(),
            addresses: vec![net.to_string()],
            gateway4: gateway,
            nameservers: Nameservers {
                addresses: vec![gateway],
            },
        };
        Ok(Self {
            version: 2,
            ethernets: BTreeMap::from([(INTERFACE.to_owned(), ethernet)]),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn derive_from_address() -> Result<()> {
        let mac = MacAddr6::from_str("52:54:00:AB:CD:EF").unwrap();
        let res = NetworkConfig::new(&mac, Ipv4Addr::new(192, 168, 122, 10))?;

        let eth = &res.ethernets[INTERFACE];
        assert_eq!(res.version, 2);
        assert_eq!(eth.matches.macaddress, "52:54:00:ab:cd:ef");
        assert_eq!(eth.set_name, "eth0");
        assert_eq!(eth.addresses, vec!["192.168.122.10/24".to_owned()]);
        assert_eq!(eth.gateway4, Ipv4Addr::new(192, 168, 122, 1));
        assert_eq!(eth.nameservers.addresses, vec![Ipv4Addr::new(192, 168, 122, 1)]);
        Ok(())
    }

    #[test]
    fn gateway_follows_subnet() -> Result<()> {
        let mac = MacAddr6::from_str("52:54:00:00:00:01").unwrap();
        let res = NetworkConfig::new(&mac, Ipv4Addr::new(10, 20, 30, 200))?;
        assert_eq!(res.ethernets[INTERFACE].gateway4, Ipv4Addr::new(10, 20, 30, 1));
        Ok(())
    }

    #[test]
    fn serialize_keys() -> Result<()> {
        let mac = MacAddr6::from_str("52:54:00:00:00:01").unwrap();
        let res = NetworkConfig::new(&mac, Ipv4Addr::new(10, 20, 30, 200))?;
        let yaml = serde_yaml::to_string(&res).unwrap();
        assert!(yaml.contains("set-name: eth0"), "{yaml}");
        assert!(yaml.contains("match:"), "{yaml}");
        assert!(yaml.contains("gateway4: 10.20.30.1"), "{yaml}");
        Ok(())
    }
}
